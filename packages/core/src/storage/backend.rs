//! Хранилища глазами SDK: строка `document.cookie` и key/value хранилище
//! в духе `localStorage`.

use std::fmt;
use std::rc::Rc;

/// Доступ в стиле `document.cookie`
pub trait CookieJar {
    /// Все видимые cookie в виде `name=value; name2=value2`
    fn cookies(&self) -> String;

    /// Записать одну строку cookie (`name=value;path=/;expires=...`)
    fn set_cookie(&self, cookie: &str);
}

/// Доступ в стиле `localStorage`
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// Пара хранилищ, с которыми работает экземпляр SDK
#[derive(Clone)]
pub struct StorageBackends {
    pub cookies: Rc<dyn CookieJar>,
    pub local_storage: Rc<dyn KeyValueStore>,
}

impl fmt::Debug for StorageBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackends").finish_non_exhaustive()
    }
}
