// Менеджер cookie
// JSON идентичности, закодированный как encodeURIComponent, с path/expires/domain.

use super::backend::CookieJar;
use super::models::{is_legacy_identity, Identity, PersistedIdentity};
use crate::config::Config;
use crate::platform::Platform;
use crate::utils::time::to_cookie_date;
use serde_json::Value;
use std::rc::Rc;

/// Атрибуты cookie из опций SDK
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
}

pub struct CookieManager {
    jar: Rc<dyn CookieJar>,
    platform: Rc<dyn Platform>,
    cookie_name: String,
    options: CookieOptions,
}

impl CookieManager {
    pub fn new(
        jar: Rc<dyn CookieJar>,
        platform: Rc<dyn Platform>,
        cookie_name: impl Into<String>,
        options: CookieOptions,
    ) -> Self {
        Self {
            jar,
            platform,
            cookie_name: cookie_name.into(),
            options,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Записать идентичность (или optout); cookie живёт до `refresh_expires`
    pub fn set_cookie(&self, value: &PersistedIdentity) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize identity for cookie: {}", e);
                return;
            }
        };
        let expires = to_cookie_date(value.refresh_expires());
        self.write(&self.cookie_name, &json, Some(&expires));
    }

    /// Записать произвольное значение под другим именем (используется для `_config`)
    pub(crate) fn write(&self, name: &str, raw_value: &str, expires: Option<&str>) {
        let path = self
            .options
            .path
            .clone()
            .unwrap_or_else(|| Config::global().default_cookie_path.clone());

        let mut cookie = format!("{}={};path={}", name, urlencoding::encode(raw_value), path);
        if let Some(expires) = expires {
            cookie.push_str(";expires=");
            cookie.push_str(expires);
        }
        if let Some(domain) = &self.options.domain {
            cookie.push_str(";domain=");
            cookie.push_str(domain);
        }
        self.jar.set_cookie(&cookie);
    }

    pub fn remove_cookie(&self) {
        self.remove(&self.cookie_name);
    }

    pub(crate) fn remove(&self, name: &str) {
        let removal = Config::global().cookie_removal_date.clone();
        self.write(name, "", Some(&removal));
    }

    /// Сырое (декодированное) значение cookie
    pub fn get_cookie(&self) -> Option<String> {
        self.read(&self.cookie_name)
    }

    pub(crate) fn read(&self, name: &str) -> Option<String> {
        let all = self.jar.cookies();
        let raw = all.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })?;

        match urlencoding::decode(&raw) {
            Ok(decoded) => Some(decoded.into_owned()),
            Err(e) => {
                tracing::warn!("cookie {} is not valid URI encoding: {}", name, e);
                None
            }
        }
    }

    /// Загрузить идентичность из cookie; старый формат мигрируется и сразу перезаписывается
    pub fn load_identity_from_cookie(&self) -> Option<PersistedIdentity> {
        let raw = self.get_cookie()?;
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("ignoring malformed identity cookie: {}", e);
                return None;
            }
        };

        if is_legacy_identity(&value) {
            let migrated = self.migrate_legacy(&value)?;
            tracing::debug!("migrated legacy identity cookie");
            self.set_cookie(&migrated);
            return Some(migrated);
        }

        PersistedIdentity::from_value(value)
    }

    fn migrate_legacy(&self, value: &Value) -> Option<PersistedIdentity> {
        let cfg = Config::global();
        let now = self.platform.now_ms();
        Some(PersistedIdentity::Identity(Identity {
            advertising_token: value.get("advertising_token")?.as_str()?.to_string(),
            refresh_token: value.get("refresh_token")?.as_str()?.to_string(),
            refresh_response_key: value
                .get("refresh_response_key")
                .and_then(Value::as_str)
                .map(str::to_string),
            identity_expires: now + cfg.legacy_identity_lifetime_ms,
            refresh_from: now,
            refresh_expires: now + cfg.legacy_refresh_lifetime_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualPlatform;
    use crate::storage::memory::MemoryCookieJar;

    const NOW: i64 = 1_700_000_000_000;

    fn setup(options: CookieOptions) -> (Rc<MemoryCookieJar>, CookieManager) {
        let platform = Rc::new(ManualPlatform::new(NOW));
        let jar = Rc::new(MemoryCookieJar::new(platform.clone()));
        let manager = CookieManager::new(jar.clone(), platform, "__uid_2", options);
        (jar, manager)
    }

    fn identity() -> Identity {
        Identity {
            advertising_token: "AgAAAA==".into(),
            refresh_token: "refresh+token/1".into(),
            refresh_response_key: Some("key".into()),
            identity_expires: NOW + 10_000,
            refresh_from: NOW + 5_000,
            refresh_expires: NOW + 20_000,
        }
    }

    #[test]
    fn test_set_cookie_writes_attributes() {
        let (jar, manager) = setup(CookieOptions {
            path: Some("/shop".into()),
            domain: Some("example.com".into()),
        });
        manager.set_cookie(&identity().into());

        let cookie = jar.get("__uid_2").unwrap();
        assert_eq!(cookie.path.as_deref(), Some("/shop"));
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.expires_ms, Some(NOW + 20_000));
        // Значение URI-закодировано
        assert!(!cookie.value.contains('{'));
    }

    #[test]
    fn test_default_path() {
        let (jar, manager) = setup(CookieOptions::default());
        manager.set_cookie(&identity().into());
        assert_eq!(jar.get("__uid_2").unwrap().path.as_deref(), Some("/"));
    }

    #[test]
    fn test_roundtrip() {
        let (_, manager) = setup(CookieOptions::default());
        manager.set_cookie(&identity().into());
        assert_eq!(
            manager.load_identity_from_cookie(),
            Some(PersistedIdentity::Identity(identity()))
        );
    }

    #[test]
    fn test_legacy_cookie_is_migrated() {
        let (jar, manager) = setup(CookieOptions::default());
        let legacy = r#"{"advertising_token":"legacy-adv","refresh_token":"legacy-ref"}"#;
        jar.set_cookie(&format!("__uid_2={}", urlencoding::encode(legacy)));

        let loaded = manager.load_identity_from_cookie().unwrap();
        let identity = loaded.as_identity().unwrap();
        assert_eq!(identity.advertising_token, "legacy-adv");
        assert_eq!(identity.refresh_from, NOW);
        assert_eq!(identity.identity_expires, NOW + 4 * 60 * 60 * 1000);
        assert_eq!(identity.refresh_expires, NOW + 7 * 24 * 60 * 60 * 1000);

        // Перезаписано в новом формате
        let cookie = jar.get("__uid_2").unwrap();
        assert_eq!(cookie.expires_ms, Some(identity.refresh_expires));
        assert!(urlencoding::decode(&cookie.value).unwrap().contains("refresh_expires"));
    }

    #[test]
    fn test_remove_cookie() {
        let (jar, manager) = setup(CookieOptions::default());
        manager.set_cookie(&identity().into());
        manager.remove_cookie();
        assert!(!jar.contains("__uid_2"));
        assert!(manager.load_identity_from_cookie().is_none());
    }

    #[test]
    fn test_malformed_cookie_is_ignored() {
        let (jar, manager) = setup(CookieOptions::default());
        jar.set_cookie("__uid_2=not-json");
        assert!(manager.load_identity_from_cookie().is_none());
    }
}
