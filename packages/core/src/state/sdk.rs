// Ядро SDK: жизненный цикл идентичности
//
// Идентичность меняется только в `validate_and_set_identity`. Пока вызываются
// пользовательские callbacks, состояние не заимствовано, поэтому из callback
// можно снова вызывать методы `Sdk`.

use super::callbacks::{CallbackManager, EventPayload, SdkEvent, Subscriber};
use super::options::{InitCallbackPayload, SdkOptions};
use super::promises::{AdvertisingTokenFuture, PromiseHandler, TokenError};
use super::status::{get_identity_status, IdentityStatus, IdentityValidity};
use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::platform::{Platform, TimerId};
use crate::product::{ProductDetails, ProductName};
use crate::protocol::messages::{
    ClientSideIdentityOptions, CstgPlaintext, CstgResult, RefreshResult,
};
use crate::protocol::transport::HttpTransport;
use crate::protocol::validation::{
    hash_and_encode, is_base64_hash, is_normalized_phone, normalize_email,
    validate_client_side_options,
};
use crate::storage::{
    ConfigStore, Identity, OptoutIdentity, PersistedIdentity, StorageBackends, StorageManager,
};
use crate::utils::error::{Result, SdkError};
use futures::FutureExt;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// Всё, что SDK берёт у окружения
#[derive(Clone)]
pub struct SdkEnvironment {
    pub platform: Rc<dyn Platform>,
    pub backends: StorageBackends,
    pub transport: Rc<dyn HttpTransport>,
}

impl SdkEnvironment {
    pub fn new(
        platform: Rc<dyn Platform>,
        backends: StorageBackends,
        transport: Rc<dyn HttpTransport>,
    ) -> Self {
        Self {
            platform,
            backends,
            transport,
        }
    }

    /// window, document.cookie, localStorage и XMLHttpRequest
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        use crate::platform::WebPlatform;
        use crate::protocol::transport::XhrTransport;
        use crate::storage::{WebCookieJar, WebLocalStorage};

        Self::new(
            Rc::new(WebPlatform::new()),
            StorageBackends {
                cookies: Rc::new(WebCookieJar),
                local_storage: Rc::new(WebLocalStorage),
            },
            Rc::new(XhrTransport::new()),
        )
    }
}

impl std::fmt::Debug for SdkEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkEnvironment").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct SdkState {
    initialized: bool,
    options: SdkOptions,
    identity: Option<PersistedIdentity>,
    /// Уже была хотя бы одна валидная идентичность (REFRESHED вместо ESTABLISHED)
    observed_identity: bool,
    storage: Option<Rc<StorageManager>>,
    api: Option<Rc<ApiClient>>,
    refresh_timer: Option<TimerId>,
    /// Статус последней валидации (уходит в payload событий)
    status: Option<IdentityStatus>,
}

struct SdkInner {
    product: ProductDetails,
    env: SdkEnvironment,
    callbacks: CallbackManager,
    promises: PromiseHandler,
    state: RefCell<SdkState>,
}

/// Экземпляр SDK (UID2 или EUID). Клонирование дешёвое: это тот же экземпляр.
#[derive(Clone)]
pub struct Sdk {
    inner: Rc<SdkInner>,
}

impl Sdk {
    /// Создать экземпляр и отправить `SdkLoaded`
    pub fn new(product: ProductName, env: SdkEnvironment) -> Self {
        let sdk = Self {
            inner: Rc::new(SdkInner {
                product: ProductDetails::for_product(product),
                env,
                callbacks: CallbackManager::new(),
                promises: PromiseHandler::new(),
                state: RefCell::new(SdkState::default()),
            }),
        };

        // Promise handler подписан первым: отложенные токены разрешаются
        // раньше, чем о событии узнают остальные подписчики
        let weak = sdk.weak();
        sdk.inner.callbacks.subscribe(
            Rc::new(move |event: SdkEvent, payload: &EventPayload| {
                if let Some(sdk) = Sdk::upgrade(&weak) {
                    let active = sdk.has_active_requests();
                    sdk.inner.promises.handle_event(event, payload, active);
                }
            }),
            EventPayload::default(),
        );

        sdk.inner
            .callbacks
            .run_callbacks(SdkEvent::SdkLoaded, EventPayload::default());
        tracing::debug!("{} SDK loaded", product);
        sdk
    }

    fn weak(&self) -> Weak<SdkInner> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<SdkInner>) -> Option<Sdk> {
        weak.upgrade().map(|inner| Sdk { inner })
    }

    pub fn product(&self) -> &ProductDetails {
        &self.inner.product
    }

    fn now(&self) -> i64 {
        self.inner.env.platform.now_ms()
    }

    fn api(&self) -> Option<Rc<ApiClient>> {
        self.inner.state.borrow().api.clone()
    }

    fn storage(&self) -> Option<Rc<StorageManager>> {
        self.inner.state.borrow().storage.clone()
    }

    fn storage_for(&self, options: &SdkOptions) -> StorageManager {
        StorageManager::new(
            &self.inner.product,
            &self.inner.env.backends,
            self.inner.env.platform.clone(),
            options.use_cookie,
            options.cookie_options(),
        )
    }

    fn config_store_for(&self, options: &SdkOptions) -> ConfigStore {
        ConfigStore::new(
            &self.inner.product,
            &self.inner.env.backends,
            self.inner.env.platform.clone(),
            options.cookie_options(),
        )
    }

    fn has_active_requests(&self) -> bool {
        self.api().map(|api| api.has_active_requests()).unwrap_or(false)
    }

    // ============================================
    // INIT
    // ============================================

    /// Инициализировать SDK.
    ///
    /// Неверные опции возвращают `TypeError` / `RangeError` и ничего не меняют.
    /// Повторный вызов сливает опции (новые побеждают) и подставляет
    /// переданную идентичность, только если она строго свежее текущей.
    pub fn init(&self, options: SdkOptions) -> Result<()> {
        options.validate()?;
        if self.is_initialized() {
            return self.reinit(options);
        }

        let supplied_identity = options.identity.clone();
        let stored_options = self.config_store_for(&options).load().unwrap_or_default();
        let mut effective = options.layered_over(stored_options);
        effective.identity = None;

        let storage = Rc::new(self.storage_for(&effective));
        let api = Rc::new(ApiClient::new(
            effective.base_url.as_deref(),
            self.inner.product.clone(),
            self.inner.env.transport.clone(),
            self.inner.env.platform.clone(),
        ));
        let candidate = choose_initial_identity(supplied_identity, storage.load_identity_with_fallback());

        {
            let mut state = self.inner.state.borrow_mut();
            state.initialized = true;
            state.options = effective.clone();
            state.storage = Some(storage);
            state.api = Some(api);
        }
        self.config_store_for(&effective).store(&effective.to_stored());
        tracing::info!(
            "{} SDK initialized (base url: {}, use cookie: {:?})",
            self.inner.product.name,
            self.api().map(|api| api.base_url()).unwrap_or_default(),
            effective.use_cookie
        );

        if let Some(identity) = self.validate_and_set_identity(candidate, None).identity {
            self.trigger_refresh_or_set_timer(&identity);
        }
        self.inner
            .callbacks
            .run_callbacks(SdkEvent::InitCompleted, self.event_payload());
        Ok(())
    }

    fn reinit(&self, options: SdkOptions) -> Result<()> {
        let (previous, current) = {
            let state = self.inner.state.borrow();
            (state.options.clone(), state.identity.clone())
        };
        let merged = previous.merged_with(&options);
        let storage = Rc::new(self.storage_for(&merged));

        let timer_armed = {
            let mut state = self.inner.state.borrow_mut();
            state.options = merged.clone();
            state.storage = Some(storage.clone());
            state.refresh_timer.is_some()
        };

        if merged.use_cookie != previous.use_cookie {
            if let Some(current) = &current {
                tracing::debug!("storage switched, re-persisting current identity");
                storage.set_value(current);
            }
        }
        if let Some(api) = self.api() {
            api.set_base_url(merged.base_url.as_deref());
        }
        self.config_store_for(&merged).store(&merged.to_stored());
        if timer_armed {
            self.set_refresh_timer();
        }
        tracing::info!("{} SDK re-initialized", self.inner.product.name);

        let Some(supplied) = options.identity else {
            return Ok(());
        };
        let newer = match &current {
            Some(PersistedIdentity::Identity(existing)) => {
                supplied.identity_expires > existing.identity_expires
            }
            _ => true,
        };
        if newer {
            self.set_identity(supplied)
        } else {
            tracing::debug!("supplied identity is not newer than the current one, keeping current");
            Ok(())
        }
    }

    // ============================================
    // ПЕРЕХОДЫ СОСТОЯНИЯ
    // ============================================

    /// Классифицировать кандидата и применить результат
    fn validate_and_set_identity(
        &self,
        candidate: Option<PersistedIdentity>,
        status_override: Option<IdentityStatus>,
    ) -> IdentityValidity {
        let (first_identity, current_token) = {
            let state = self.inner.state.borrow();
            let token = state
                .identity
                .as_ref()
                .and_then(PersistedIdentity::as_identity)
                .map(|identity| identity.advertising_token.clone());
            (!state.observed_identity, token)
        };

        let mut validity = get_identity_status(candidate.as_ref(), self.now(), first_identity);
        if let Some(status) = status_override {
            validity.status = status;
            validity.error_message = status.text();
        }
        self.inner.state.borrow_mut().status = Some(validity.status);

        if let Some(identity) = validity.identity.clone() {
            if current_token.as_deref() == Some(identity.advertising_token.as_str()) {
                return validity;
            }

            let persisted = PersistedIdentity::from(identity);
            if let Some(storage) = self.storage() {
                storage.set_identity(&persisted);
            }
            let mut state = self.inner.state.borrow_mut();
            state.identity = Some(persisted);
            state.observed_identity = true;
        } else {
            self.cancel_pending_work();
            let storage = self.storage();
            let retained = match (validity.status, storage) {
                (IdentityStatus::Optout, Some(storage)) => Some(storage.set_optout().into()),
                (IdentityStatus::Optout, None) => Some(self.optout_sentinel().into()),
                (_, Some(storage)) => {
                    storage.remove_values();
                    None
                }
                (_, None) => None,
            };
            self.inner.state.borrow_mut().identity = retained;
        }

        tracing::debug!(
            "identity status {} ({})",
            validity.status.code(),
            validity.error_message
        );
        self.notify_init_callback(&validity);
        validity
    }

    fn notify_init_callback(&self, validity: &IdentityValidity) {
        let Some(callback) = self.inner.state.borrow().options.callback.clone() else {
            return;
        };
        let payload =
            InitCallbackPayload::new(validity.status, validity.error_message, self.get_identity());
        if catch_unwind(AssertUnwindSafe(|| callback(&payload))).is_err() {
            tracing::error!("init callback panicked");
        }
    }

    /// Payload событий: статус последней валидации и текущая идентичность
    fn event_payload(&self) -> EventPayload {
        let status = self
            .inner
            .state
            .borrow()
            .status
            .unwrap_or(IdentityStatus::NoIdentity);
        EventPayload::from_status(status, self.get_identity())
    }

    fn optout_sentinel(&self) -> OptoutIdentity {
        OptoutIdentity::new(self.now() + Config::global().optout_lifetime_ms)
    }

    fn trigger_refresh_or_set_timer(&self, identity: &Identity) {
        if identity.refresh_from <= self.now() {
            self.refresh_token(identity);
        } else {
            self.set_refresh_timer();
        }
    }

    fn set_refresh_timer(&self) {
        self.clear_refresh_timer();
        let period = self.inner.state.borrow().options.refresh_retry_period_ms();
        let weak = self.weak();
        let id = self.inner.env.platform.set_timeout(
            period,
            Box::new(move || {
                if let Some(sdk) = Sdk::upgrade(&weak) {
                    sdk.on_refresh_timer();
                }
            }),
        );
        self.inner.state.borrow_mut().refresh_timer = Some(id);
    }

    fn clear_refresh_timer(&self) {
        let timer = self.inner.state.borrow_mut().refresh_timer.take();
        if let Some(id) = timer {
            self.inner.env.platform.clear_timeout(id);
        }
    }

    /// Таймер: перечитать хранилище (другая вкладка могла обновить токен)
    /// и снова решить, обновлять ли идентичность
    fn on_refresh_timer(&self) {
        self.inner.state.borrow_mut().refresh_timer = None;
        if self.is_login_required() != Some(false) {
            return;
        }
        let Some(storage) = self.storage() else {
            return;
        };

        let before = self.inner.state.borrow().identity.clone();
        if let Some(identity) = self
            .validate_and_set_identity(storage.load_identity(), None)
            .identity
        {
            self.trigger_refresh_or_set_timer(&identity);
        }

        if self.inner.state.borrow().identity != before {
            self.inner
                .callbacks
                .run_callbacks(SdkEvent::IdentityUpdated, self.event_payload());
        }
    }

    fn refresh_token(&self, identity: &Identity) {
        let Some(api) = self.api() else {
            return;
        };
        self.clear_refresh_timer();
        tracing::debug!("refreshing identity");

        let request = api.call_refresh_api(identity);
        let weak = self.weak();
        let identity = identity.clone();
        self.inner.env.platform.spawn_local(
            async move {
                let result = request.await;
                if let Some(sdk) = Sdk::upgrade(&weak) {
                    sdk.handle_refresh_result(&identity, result);
                }
            }
            .boxed_local(),
        );
    }

    fn handle_refresh_result(
        &self,
        identity: &Identity,
        result: std::result::Result<RefreshResult, ApiError>,
    ) {
        match result {
            Err(e) if e.is_aborted() => {
                tracing::debug!("refresh aborted");
                return;
            }
            Ok(RefreshResult::Success(refreshed)) => {
                if self.validate_and_set_identity(Some(refreshed.into()), None).valid {
                    self.set_refresh_timer();
                }
            }
            Ok(RefreshResult::Optout) => {
                self.validate_and_set_identity(Some(self.optout_sentinel().into()), None);
                self.inner
                    .callbacks
                    .run_callbacks(SdkEvent::OptoutReceived, self.event_payload());
            }
            Ok(RefreshResult::ExpiredToken) => {
                self.validate_and_set_identity(None, Some(IdentityStatus::RefreshExpired));
            }
            Err(e) => {
                tracing::warn!("token refresh failed, keeping current identity: {}", e);
                if self
                    .validate_and_set_identity(Some(identity.clone().into()), None)
                    .valid
                {
                    self.set_refresh_timer();
                }
            }
        }
        self.inner
            .callbacks
            .run_callbacks(SdkEvent::IdentityUpdated, self.event_payload());
    }

    /// Остановить таймер и отменить запросы в полёте
    fn cancel_pending_work(&self) {
        self.clear_refresh_timer();
        if let Some(api) = self.api() {
            api.abort_active_requests();
        }
    }

    // ============================================
    // ПУБЛИЧНЫЙ API
    // ============================================

    /// Установить идентичность (или маркер optout) вручную
    pub fn set_identity(&self, identity: impl Into<PersistedIdentity>) -> Result<()> {
        if !self.is_initialized() {
            return Err(SdkError::NotInitialized("setIdentity"));
        }
        if let Some(api) = self.api() {
            api.abort_active_requests();
        }

        let validity = self.validate_and_set_identity(Some(identity.into()), None);
        if let Some(identity) = &validity.identity {
            self.trigger_refresh_or_set_timer(identity);
        }
        if validity.status == IdentityStatus::Optout {
            self.inner
                .callbacks
                .run_callbacks(SdkEvent::OptoutReceived, self.event_payload());
        }
        self.inner
            .callbacks
            .run_callbacks(SdkEvent::IdentityUpdated, self.event_payload());
        Ok(())
    }

    pub async fn set_identity_from_email(
        &self,
        email: &str,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        self.check_client_side_call("setIdentityFromEmail", options)?;
        let normalized = normalize_email(email)
            .ok_or_else(|| SdkError::InvalidInput("Invalid email address".to_string()))?;
        self.client_side_identity(CstgPlaintext::EmailHash(hash_and_encode(&normalized)), options)
            .await
    }

    pub async fn set_identity_from_email_hash(
        &self,
        email_hash: &str,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        self.check_client_side_call("setIdentityFromEmailHash", options)?;
        if !is_base64_hash(email_hash) {
            return Err(SdkError::InvalidInput("Invalid hash".to_string()));
        }
        self.client_side_identity(CstgPlaintext::EmailHash(email_hash.to_string()), options)
            .await
    }

    pub async fn set_identity_from_phone(
        &self,
        phone: &str,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        self.check_client_side_call("setIdentityFromPhone", options)?;
        if !is_normalized_phone(phone) {
            return Err(SdkError::InvalidInput("Invalid phone number".to_string()));
        }
        self.client_side_identity(CstgPlaintext::PhoneHash(hash_and_encode(phone)), options)
            .await
    }

    pub async fn set_identity_from_phone_hash(
        &self,
        phone_hash: &str,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        self.check_client_side_call("setIdentityFromPhoneHash", options)?;
        if !is_base64_hash(phone_hash) {
            return Err(SdkError::InvalidInput("Invalid hash".to_string()));
        }
        self.client_side_identity(CstgPlaintext::PhoneHash(phone_hash.to_string()), options)
            .await
    }

    fn check_client_side_call(
        &self,
        method: &'static str,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        if !self.is_initialized() {
            return Err(SdkError::NotInitialized(method));
        }
        validate_client_side_options(options, self.inner.product.name)
    }

    async fn client_side_identity(
        &self,
        plaintext: CstgPlaintext,
        options: &ClientSideIdentityOptions,
    ) -> Result<()> {
        let api = self
            .api()
            .ok_or(SdkError::NotInitialized("setIdentity"))?;
        match api.call_cstg_api(plaintext, options).await? {
            CstgResult::Success(identity) => self.set_identity(identity),
            CstgResult::Optout => self.set_identity(self.optout_sentinel()),
        }
    }

    /// Полный сброс: отклонить ожидающие запросы токена, остановить работу,
    /// очистить оба хранилища
    pub fn disconnect(&self) {
        self.inner.promises.reject_all(TokenError::Aborted(format!(
            "{} SDK aborted.",
            self.inner.product.name
        )));
        self.cancel_pending_work();

        let (storage, options) = {
            let state = self.inner.state.borrow();
            (state.storage.clone(), state.options.clone())
        };
        let storage = storage.unwrap_or_else(|| Rc::new(self.storage_for(&options)));
        storage.remove_values();
        self.config_store_for(&options).remove();
        {
            let mut state = self.inner.state.borrow_mut();
            state.identity = None;
            state.status = Some(IdentityStatus::NoIdentity);
        }

        tracing::info!("{} SDK disconnected", self.inner.product.name);
        self.inner
            .callbacks
            .run_callbacks(SdkEvent::IdentityUpdated, self.event_payload());
    }

    /// Остановить таймер и запросы, не трогая хранилище
    pub fn abort(&self) {
        self.cancel_pending_work();
    }

    /// Идентичность в памяти; до init - из хранилища
    fn current_or_stored_identity(&self) -> Option<PersistedIdentity> {
        let state = self.inner.state.borrow();
        if state.initialized {
            return state.identity.clone();
        }
        let options = state.options.clone();
        drop(state);
        self.storage_for(&options).load_identity_with_fallback()
    }

    /// Текущая пригодная идентичность; просроченная (EXPIRED) не возвращается
    pub fn get_identity(&self) -> Option<Identity> {
        let candidate = self.current_or_stored_identity();
        let validity = get_identity_status(candidate.as_ref(), self.now(), false);
        if validity.valid && validity.status != IdentityStatus::Expired {
            validity.identity
        } else {
            None
        }
    }

    pub fn get_advertising_token(&self) -> Option<String> {
        self.get_identity().map(|identity| identity.advertising_token)
    }

    /// Токен после завершения init и запросов в полёте
    pub fn get_advertising_token_async(&self) -> AdvertisingTokenFuture {
        self.inner
            .promises
            .get_advertising_token_async(self.get_advertising_token(), self.has_active_requests())
    }

    /// Идентичность валидна (в том числе EXPIRED) или обновляется
    pub fn is_identity_available(&self) -> bool {
        let candidate = self.current_or_stored_identity();
        get_identity_status(candidate.as_ref(), self.now(), false).valid || self.has_active_requests()
    }

    /// `None` до init
    pub fn is_login_required(&self) -> Option<bool> {
        if !self.is_initialized() {
            return None;
        }
        Some(!self.is_identity_available())
    }

    pub fn has_opted_out(&self) -> bool {
        let state = self.inner.state.borrow();
        state.initialized
            && state
                .identity
                .as_ref()
                .map(PersistedIdentity::is_optout)
                .unwrap_or(false)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.borrow().initialized
    }

    /// Подписаться на события; SdkLoaded / InitCompleted повторяются новому подписчику
    pub fn subscribe(&self, callback: Subscriber) {
        self.inner.callbacks.subscribe(callback, self.event_payload());
    }
}

/// Первый init: сохранённая идентичность побеждает, только если она строго свежее.
/// Сохранённый optout переданную идентичность не перекрывает.
fn choose_initial_identity(
    supplied: Option<Identity>,
    stored: Option<PersistedIdentity>,
) -> Option<PersistedIdentity> {
    match (supplied, stored) {
        (Some(supplied), Some(PersistedIdentity::Identity(stored)))
            if stored.identity_expires > supplied.identity_expires =>
        {
            Some(stored.into())
        }
        (Some(supplied), _) => Some(supplied.into()),
        (None, stored) => stored,
    }
}

impl std::fmt::Debug for Sdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Sdk")
            .field("product", &self.inner.product.name)
            .field("initialized", &state.initialized)
            .field("has_identity", &state.identity.is_some())
            .field("refresh_timer", &state.refresh_timer)
            .field("callbacks", &self.inner.callbacks)
            .field("promises", &self.inner.promises)
            .finish()
    }
}
