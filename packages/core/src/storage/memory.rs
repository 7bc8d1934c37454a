// In-memory хранилища для тестов и non-WASM платформ

use super::backend::{CookieJar, KeyValueStore};
use crate::platform::Platform;
use crate::utils::time::parse_cookie_date;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Cookie вместе с атрибутами, с которыми она была записана
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires_ms: Option<i64>,
}

/// Эмуляция `document.cookie` со сроком жизни по часам платформы
pub struct MemoryCookieJar {
    platform: Rc<dyn Platform>,
    cookies: RefCell<BTreeMap<String, StoredCookie>>,
}

impl MemoryCookieJar {
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self {
            platform,
            cookies: RefCell::new(BTreeMap::new()),
        }
    }

    /// Получить cookie (если она не истекла)
    pub fn get(&self, name: &str) -> Option<StoredCookie> {
        let now = self.platform.now_ms();
        self.cookies
            .borrow()
            .get(name)
            .filter(|c| c.expires_ms.map_or(true, |exp| exp > now))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn parse(cookie: &str) -> Option<(String, StoredCookie)> {
        let mut parts = cookie.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let mut stored = StoredCookie {
            value: value.trim().to_string(),
            path: None,
            domain: None,
            expires_ms: None,
        };

        for attr in parts {
            let Some((key, val)) = attr.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "path" => stored.path = Some(val.trim().to_string()),
                "domain" => stored.domain = Some(val.trim().to_string()),
                "expires" => stored.expires_ms = parse_cookie_date(val),
                _ => {}
            }
        }

        Some((name.trim().to_string(), stored))
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookies(&self) -> String {
        let now = self.platform.now_ms();
        self.cookies
            .borrow()
            .iter()
            .filter(|(_, c)| c.expires_ms.map_or(true, |exp| exp > now))
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, cookie: &str) {
        let Some((name, stored)) = Self::parse(cookie) else {
            return;
        };
        let now = self.platform.now_ms();
        let mut cookies = self.cookies.borrow_mut();
        // Дата в прошлом удаляет cookie, как в браузере
        if stored.expires_ms.is_some_and(|exp| exp <= now) {
            cookies.remove(&name);
        } else {
            cookies.insert(name, stored);
        }
    }
}

impl fmt::Debug for MemoryCookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCookieJar")
            .field("cookies", &self.cookies.borrow())
            .finish()
    }
}

/// Эмуляция `localStorage`
#[derive(Debug, Default)]
pub struct MemoryLocalStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}
