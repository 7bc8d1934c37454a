// Опции init() и payload init callback

use super::callbacks::EventPayload;
use crate::config::Config;
use crate::storage::config_store::StoredSdkOptions;
use crate::storage::cookie::CookieOptions;
use crate::storage::models::Identity;
use crate::utils::error::{Result, SdkError};
use std::rc::Rc;

pub type InitCallback = Rc<dyn Fn(&InitCallbackPayload)>;

/// Параметры `init()`
#[derive(Clone, Default)]
pub struct SdkOptions {
    pub identity: Option<Identity>,
    pub base_url: Option<String>,
    pub use_cookie: Option<bool>,
    pub cookie_path: Option<String>,
    pub cookie_domain: Option<String>,
    pub refresh_retry_period: Option<u32>,
    pub callback: Option<InitCallback>,
}

impl SdkOptions {
    /// Проверить форму опций; ошибки - ошибки программиста
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            let parsed = url::Url::parse(base_url)
                .map_err(|e| SdkError::TypeError(format!("opts.baseUrl is not a valid URL: {}", e)))?;
            if parsed.cannot_be_a_base() {
                return Err(SdkError::TypeError(
                    "opts.baseUrl must be an absolute URL".to_string(),
                ));
            }
        }

        if let Some(path) = &self.cookie_path {
            if !path.starts_with('/') {
                return Err(SdkError::TypeError(
                    "opts.cookiePath must start with '/'".to_string(),
                ));
            }
        }

        if let Some(domain) = &self.cookie_domain {
            if domain.trim().is_empty() {
                return Err(SdkError::TypeError("opts.cookieDomain must be a non-empty string".to_string()));
            }
        }

        if let Some(period) = self.refresh_retry_period {
            let min = Config::global().min_refresh_retry_period_ms;
            if period < min {
                return Err(SdkError::RangeError(format!(
                    "opts.refreshRetryPeriod must be >= {}",
                    min
                )));
            }
        }

        Ok(())
    }

    pub fn refresh_retry_period_ms(&self) -> u32 {
        self.refresh_retry_period
            .unwrap_or(Config::global().default_refresh_retry_period_ms)
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            path: self.cookie_path.clone(),
            domain: self.cookie_domain.clone(),
        }
    }

    /// Повторный init: заданные в `newer` поля побеждают.
    /// Идентичность не сливается, её подставляет ядро SDK.
    pub fn merged_with(&self, newer: &SdkOptions) -> SdkOptions {
        SdkOptions {
            identity: None,
            base_url: newer.base_url.clone().or_else(|| self.base_url.clone()),
            use_cookie: newer.use_cookie.or(self.use_cookie),
            cookie_path: newer.cookie_path.clone().or_else(|| self.cookie_path.clone()),
            cookie_domain: newer.cookie_domain.clone().or_else(|| self.cookie_domain.clone()),
            refresh_retry_period: newer.refresh_retry_period.or(self.refresh_retry_period),
            callback: newer.callback.clone().or_else(|| self.callback.clone()),
        }
    }

    /// Сохранённые опции под заданными (первый init)
    pub fn layered_over(mut self, stored: StoredSdkOptions) -> SdkOptions {
        self.base_url = self.base_url.or(stored.base_url);
        self.use_cookie = self.use_cookie.or(stored.use_cookie);
        self.refresh_retry_period = self.refresh_retry_period.or(stored.refresh_retry_period);
        self.cookie_path = self.cookie_path.or(stored.cookie_path);
        self.cookie_domain = self.cookie_domain.or(stored.cookie_domain);
        self
    }

    pub fn to_stored(&self) -> StoredSdkOptions {
        StoredSdkOptions {
            base_url: self.base_url.clone(),
            use_cookie: self.use_cookie,
            refresh_retry_period: self.refresh_retry_period,
            cookie_path: self.cookie_path.clone(),
            cookie_domain: self.cookie_domain.clone(),
        }
    }
}

impl std::fmt::Debug for SdkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkOptions")
            .field("identity", &self.identity.as_ref().map(|_| "<identity>"))
            .field("base_url", &self.base_url)
            .field("use_cookie", &self.use_cookie)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .field("refresh_retry_period", &self.refresh_retry_period)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Init callback получает тот же payload, что и подписчики
pub type InitCallbackPayload = EventPayload;
