// Менеджер localStorage: тот же контракт, что у cookie, без миграции и domain

use super::backend::KeyValueStore;
use super::models::PersistedIdentity;
use serde_json::Value;
use std::rc::Rc;

pub struct LocalStorageManager {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl LocalStorageManager {
    pub fn new(store: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_value(&self, value: &PersistedIdentity) {
        match serde_json::to_string(value) {
            Ok(json) => self.store.set_item(&self.key, &json),
            Err(e) => tracing::warn!("failed to serialize identity for localStorage: {}", e),
        }
    }

    pub fn remove_value(&self) {
        self.store.remove_item(&self.key);
    }

    pub fn load_identity_from_local_storage(&self) -> Option<PersistedIdentity> {
        let raw = self.store.get_item(&self.key)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => PersistedIdentity::from_value(value),
            Err(e) => {
                tracing::warn!("ignoring malformed localStorage identity: {}", e);
                None
            }
        }
    }
}
