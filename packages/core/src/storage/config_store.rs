// Хранилище опций SDK между вызовами init()
//
// `<cookieName>_config` (сессионная cookie) или `<localStorageKey>_config`.

use super::backend::{KeyValueStore, StorageBackends};
use super::cookie::{CookieManager, CookieOptions};
use crate::platform::Platform;
use crate::product::ProductDetails;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Подмножество опций, которое переживает повторные init()
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSdkOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cookie: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_retry_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_domain: Option<String>,
}

pub struct ConfigStore {
    cookie: CookieManager,
    local_storage: Rc<dyn KeyValueStore>,
    local_key: String,
}

impl ConfigStore {
    pub fn new(
        product: &ProductDetails,
        backends: &StorageBackends,
        platform: Rc<dyn Platform>,
        cookie_options: CookieOptions,
    ) -> Self {
        Self {
            cookie: CookieManager::new(
                backends.cookies.clone(),
                platform,
                product.config_cookie_name(),
                cookie_options,
            ),
            local_storage: backends.local_storage.clone(),
            local_key: product.config_local_storage_key(),
        }
    }

    pub fn store(&self, options: &StoredSdkOptions) {
        let json = match serde_json::to_string(options) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize SDK options: {}", e);
                return;
            }
        };

        // Копия в другом хранилище устарела: load() читает cookie первой
        if options.use_cookie == Some(true) {
            self.cookie.write(self.cookie.cookie_name(), &json, None);
            self.local_storage.remove_item(&self.local_key);
        } else {
            self.local_storage.set_item(&self.local_key, &json);
            self.cookie.remove_cookie();
        }
    }

    /// Сохранённые опции; cookie проверяется первой
    pub fn load(&self) -> Option<StoredSdkOptions> {
        let raw = self
            .cookie
            .get_cookie()
            .or_else(|| self.local_storage.get_item(&self.local_key))?;

        match serde_json::from_str(&raw) {
            Ok(options) => Some(options),
            Err(e) => {
                tracing::warn!("ignoring malformed stored SDK options: {}", e);
                None
            }
        }
    }

    pub fn remove(&self) {
        self.cookie.remove_cookie();
        self.local_storage.remove_item(&self.local_key);
    }
}
