// Время: миллисекунды эпохи и формат дат cookie

use chrono::{DateTime, TimeZone, Utc};

/// Дата в формате `Date.prototype.toUTCString()`, который ожидает атрибут `expires`
pub fn to_cookie_date(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(date) => date.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => crate::config::Config::global().cookie_removal_date.clone(),
    }
}

/// Обратное преобразование (RFC 1123 / RFC 2822)
pub fn parse_cookie_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.timestamp_millis())
}
