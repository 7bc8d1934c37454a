// Модуль хранилища (cookie / localStorage)

pub mod backend;
pub mod config_store;
pub mod cookie;
pub mod local;
pub mod manager;
pub mod memory;
pub mod models;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use backend::{CookieJar, KeyValueStore, StorageBackends};
pub use config_store::{ConfigStore, StoredSdkOptions};
pub use cookie::{CookieManager, CookieOptions};
pub use local::LocalStorageManager;
pub use manager::StorageManager;
pub use memory::{MemoryCookieJar, MemoryLocalStorage};
pub use models::{Identity, OptoutIdentity, PersistedIdentity};

#[cfg(target_arch = "wasm32")]
pub use web::{WebCookieJar, WebLocalStorage};
