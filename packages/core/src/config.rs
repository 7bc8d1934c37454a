//! Централизованная конфигурация SDK
//!
//! Все константы жизненного цикла идентичности должны быть определены здесь,
//! чтобы избежать хардкода по всему проекту. Настройки конкретного экземпляра
//! (baseUrl, useCookie, ...) живут в `SdkOptions`.

use std::sync::OnceLock;

/// Глобальная конфигурация (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // ОБНОВЛЕНИЕ ТОКЕНА
    // ============================================

    /// Период проверки/повтора обновления по умолчанию (мс)
    pub default_refresh_retry_period_ms: u32,

    /// Минимально допустимый `refreshRetryPeriod` (мс)
    pub min_refresh_retry_period_ms: u32,

    // ============================================
    // ХРАНИЛИЩЕ
    // ============================================

    /// Путь cookie по умолчанию
    pub default_cookie_path: String,

    /// Дата в прошлом, которой "удаляется" cookie
    pub cookie_removal_date: String,

    /// Время жизни маркера optout (мс)
    /// По умолчанию: 72 часа
    pub optout_lifetime_ms: i64,

    /// Миграция legacy cookie: через сколько истекает identity (мс)
    pub legacy_identity_lifetime_ms: i64,

    /// Миграция legacy cookie: через сколько истекает refresh (мс)
    pub legacy_refresh_lifetime_ms: i64,

    // ============================================
    // КРИПТОГРАФИЧЕСКИЕ ПАРАМЕТРЫ
    // ============================================

    /// Длина IV для AES-GCM (в байтах)
    pub nonce_length: usize,

    /// Размер GCM authentication tag (в байтах)
    pub gcm_tag_length: usize,

    /// Длина префикса публичного ключа сервера (`UID2-X-P-`)
    pub server_public_key_prefix_length: usize,

    /// Длина base64 SHA-256 хеша (32 байта)
    pub base64_hash_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_refresh_retry_period_ms: 5000,
            min_refresh_retry_period_ms: 1000,

            default_cookie_path: "/".to_string(),
            cookie_removal_date: "Tue, 1 Jan 1980 23:59:59 GMT".to_string(),
            optout_lifetime_ms: 72 * HOUR_MS,
            legacy_identity_lifetime_ms: 4 * HOUR_MS,
            legacy_refresh_lifetime_ms: 7 * DAY_MS,

            nonce_length: 12,
            gcm_tag_length: 16,
            server_public_key_prefix_length: 9,
            base64_hash_length: 44,
        }
    }
}

impl Config {
    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}
