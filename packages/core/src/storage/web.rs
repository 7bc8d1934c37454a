// Браузерные хранилища: document.cookie и window.localStorage

use super::backend::{CookieJar, KeyValueStore};
use wasm_bindgen::JsCast;
use web_sys::HtmlDocument;

#[derive(Debug, Default)]
pub struct WebCookieJar;

impl WebCookieJar {
    fn document() -> Option<HtmlDocument> {
        web_sys::window()?
            .document()?
            .dyn_into::<HtmlDocument>()
            .ok()
    }
}

impl CookieJar for WebCookieJar {
    fn cookies(&self) -> String {
        Self::document()
            .and_then(|doc| doc.cookie().ok())
            .unwrap_or_default()
    }

    fn set_cookie(&self, cookie: &str) {
        let Some(doc) = Self::document() else {
            tracing::warn!("document is not available, cookie not written");
            return;
        };
        if let Err(e) = doc.set_cookie(cookie) {
            tracing::warn!("failed to write cookie: {:?}", e);
        }
    }
}

#[derive(Debug, Default)]
pub struct WebLocalStorage;

impl WebLocalStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

impl KeyValueStore for WebLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) {
        match Self::storage() {
            Some(storage) => {
                if let Err(e) = storage.set_item(key, value) {
                    tracing::warn!("failed to write localStorage[{}]: {:?}", key, e);
                }
            }
            None => tracing::warn!("localStorage is not available"),
        }
    }

    fn remove_item(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}
