// Агрегатный менеджер хранилища: cookie или localStorage в зависимости от `useCookie`

use super::backend::StorageBackends;
use super::cookie::{CookieManager, CookieOptions};
use super::local::LocalStorageManager;
use super::models::{OptoutIdentity, PersistedIdentity};
use crate::config::Config;
use crate::platform::Platform;
use crate::product::ProductDetails;
use std::rc::Rc;

pub struct StorageManager {
    platform: Rc<dyn Platform>,
    cookie: CookieManager,
    local: LocalStorageManager,
    /// `None` - не задано интегратором (по умолчанию localStorage)
    use_cookie: Option<bool>,
}

impl StorageManager {
    pub fn new(
        product: &ProductDetails,
        backends: &StorageBackends,
        platform: Rc<dyn Platform>,
        use_cookie: Option<bool>,
        cookie_options: CookieOptions,
    ) -> Self {
        Self {
            cookie: CookieManager::new(
                backends.cookies.clone(),
                platform.clone(),
                product.cookie_name,
                cookie_options,
            ),
            local: LocalStorageManager::new(
                backends.local_storage.clone(),
                product.local_storage_key,
            ),
            platform,
            use_cookie,
        }
    }

    pub fn uses_cookie(&self) -> bool {
        self.use_cookie == Some(true)
    }

    pub fn cookie(&self) -> &CookieManager {
        &self.cookie
    }

    pub fn local(&self) -> &LocalStorageManager {
        &self.local
    }

    /// Первый init: читаем оба хранилища, побеждает более поздний `identity_expires`.
    /// При равенстве выигрывает cookie.
    pub fn load_identity_with_fallback(&self) -> Option<PersistedIdentity> {
        let from_cookie = self.cookie.load_identity_from_cookie();
        let from_local = self.local.load_identity_from_local_storage();

        match (from_cookie, from_local) {
            (Some(cookie), Some(local)) => {
                if local.identity_expires() > cookie.identity_expires() {
                    Some(local)
                } else {
                    Some(cookie)
                }
            }
            (cookie, local) => cookie.or(local),
        }
    }

    /// Читать только из выбранного хранилища
    pub fn load_identity(&self) -> Option<PersistedIdentity> {
        if self.uses_cookie() {
            self.cookie.load_identity_from_cookie()
        } else {
            self.local.load_identity_from_local_storage()
        }
    }

    pub fn set_identity(&self, identity: &PersistedIdentity) {
        self.set_value(identity);
    }

    /// Записать маркер optout со сроком жизни из конфигурации
    pub fn set_optout(&self) -> OptoutIdentity {
        let expires = self.platform.now_ms() + Config::global().optout_lifetime_ms;
        let optout = OptoutIdentity::new(expires);
        self.set_value(&optout.clone().into());
        optout
    }

    pub fn set_value(&self, value: &PersistedIdentity) {
        if self.uses_cookie() {
            self.cookie.set_cookie(value);
            return;
        }

        self.local.set_value(value);
        // Только явный `useCookie: false` чистит cookie
        if self.use_cookie == Some(false) && self.cookie.get_cookie().is_some() {
            tracing::debug!("removing stray identity cookie");
            self.cookie.remove_cookie();
        }
    }

    /// Очистить оба хранилища (disconnect)
    pub fn remove_values(&self) {
        self.cookie.remove_cookie();
        self.local.remove_value();
    }
}
