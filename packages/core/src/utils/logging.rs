// Логирование
//
// Весь крейт пишет через `tracing`; здесь только установка подписчика.
// В браузере вывод идёт в `console`, на нативных платформах в stderr.

use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// Установить глобальный подписчик `tracing` (повторные вызовы игнорируются)
pub fn init_logging(max_level: Level) {
    INIT.call_once(|| {
        let builder = tracing_subscriber::fmt()
            .with_max_level(max_level)
            .with_target(false)
            .without_time()
            .with_ansi(false);

        #[cfg(target_arch = "wasm32")]
        let subscriber = builder
            .with_writer(crate::wasm::console::MakeConsoleWriter)
            .finish();
        #[cfg(not(target_arch = "wasm32"))]
        let subscriber = builder.with_writer(std::io::stderr).finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("tracing subscriber already installed by the host");
        }
    });
}
