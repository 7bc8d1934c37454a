use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use std::collections::HashMap;
use std::cell::RefCell;
use std::rc::Rc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::ProductName;
use crate::protocol::messages::ClientSideIdentityOptions;
use crate::signals::{AdvertisingTokenSource, SdkRegistry};
use crate::state::{EventPayload, InitCallbackPayload, Sdk, SdkEnvironment, SdkEvent, SdkOptions};
use crate::storage::{Identity, PersistedIdentity};
use crate::utils::error::SdkError;
use crate::utils::logging::init_logging;

// Однопоточный WASM: экземпляры живут в thread_local и адресуются строковым id.
thread_local! {
    static SDKS: RefCell<HashMap<String, SdkHandle>> = RefCell::new(HashMap::new());
    static REGISTRY: Rc<SdkRegistry> = Rc::new(SdkRegistry::new());
}

type JsResult<T> = Result<T, JsValue>;

/// Экземпляр и его запись в реестре продукта
struct SdkHandle {
    sdk: Sdk,
    source: Rc<dyn AdvertisingTokenSource>,
}

/// Реестр экземпляров по продукту (его читают адаптеры secure signals)
pub(crate) fn sdk_registry() -> Rc<SdkRegistry> {
    REGISTRY.with(Rc::clone)
}

fn with_sdk(sdk_id: &str) -> JsResult<Sdk> {
    SDKS.with(|sdks| sdks.borrow().get(sdk_id).map(|handle| handle.sdk.clone()))
        .ok_or_else(|| JsValue::from_str(&format!("SDK instance {} not found", sdk_id)))
}

/// Опции init() в том виде, в каком их передаёт страница
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsInitOptions {
    #[serde(default)]
    identity: Option<serde_json::Value>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    use_cookie: Option<bool>,
    #[serde(default)]
    cookie_path: Option<String>,
    #[serde(default)]
    cookie_domain: Option<String>,
    #[serde(default)]
    refresh_retry_period: Option<u32>,
}

/// Объект неверной формы становится идентичностью с пустыми токенами (INVALID)
fn identity_from_value(value: serde_json::Value) -> Identity {
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!("malformed identity supplied: {}", e);
        Identity {
            advertising_token: String::new(),
            refresh_token: String::new(),
            refresh_response_key: None,
            identity_expires: 0,
            refresh_from: 0,
            refresh_expires: 0,
        }
    })
}

fn persisted_from_js(value: JsValue) -> JsResult<PersistedIdentity> {
    let value: serde_json::Value = serde_wasm_bindgen::from_value(value).map_err(SdkError::from)?;
    Ok(PersistedIdentity::from_value(value.clone())
        .unwrap_or_else(|| identity_from_value(value).into()))
}

fn to_js<T: Serialize>(value: &T) -> JsResult<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| SdkError::from(e).into())
}

fn options_from_js(opts: JsValue) -> JsResult<SdkOptions> {
    if opts.is_undefined() || opts.is_null() {
        return Ok(SdkOptions::default());
    }

    let callback = js_sys::Reflect::get(&opts, &JsValue::from_str("callback"))?;
    let parsed: JsInitOptions = serde_wasm_bindgen::from_value(opts).map_err(SdkError::from)?;

    let callback = if callback.is_undefined() || callback.is_null() {
        None
    } else {
        let function = callback
            .dyn_into::<js_sys::Function>()
            .map_err(|_| SdkError::TypeError("opts.callback must be a function".to_string()))?;
        let callback: crate::state::InitCallback = Rc::new(move |payload: &InitCallbackPayload| {
            let value = match to_js(payload) {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!("failed to convert init callback payload: {:?}", e);
                    return;
                }
            };
            if let Err(e) = function.call1(&JsValue::NULL, &value) {
                tracing::error!("init callback threw: {:?}", e);
            }
        });
        Some(callback)
    };

    Ok(SdkOptions {
        identity: parsed.identity.map(identity_from_value),
        base_url: parsed.base_url,
        use_cookie: parsed.use_cookie,
        cookie_path: parsed.cookie_path,
        cookie_domain: parsed.cookie_domain,
        refresh_retry_period: parsed.refresh_retry_period,
        callback,
    })
}

fn cstg_options_from_js(opts: JsValue) -> JsResult<ClientSideIdentityOptions> {
    serde_wasm_bindgen::from_value(opts)
        .map_err(|e| SdkError::TypeError(format!("invalid client-side identity options: {}", e)).into())
}

/// Создать экземпляр SDK ("UID2" / "EUID"); возвращает его id
#[wasm_bindgen]
pub fn create_sdk(product: String) -> JsResult<String> {
    console_error_panic_hook::set_once();
    init_logging(tracing::Level::INFO);

    let product: ProductName = product
        .parse()
        .map_err(|e: String| JsValue::from(SdkError::TypeError(e)))?;
    let sdk = Sdk::new(product, SdkEnvironment::browser());
    let source: Rc<dyn AdvertisingTokenSource> = Rc::new(sdk.clone());
    sdk_registry().register(product, source.clone());

    let sdk_id = Uuid::new_v4().to_string();
    SDKS.with(|sdks| {
        sdks.borrow_mut().insert(sdk_id.clone(), SdkHandle { sdk, source });
    });
    Ok(sdk_id)
}

#[wasm_bindgen]
pub fn destroy_sdk(sdk_id: String) {
    let removed = SDKS.with(|sdks| sdks.borrow_mut().remove(&sdk_id));
    if let Some(SdkHandle { sdk, source }) = removed {
        sdk.abort();
        // Продукт мог уже перейти к более новому экземпляру
        sdk_registry().unregister_if_same(sdk.product().name, &source);
    }
}

#[wasm_bindgen]
pub fn sdk_init(sdk_id: String, opts: JsValue) -> JsResult<()> {
    let sdk = with_sdk(&sdk_id)?;
    let options = options_from_js(opts)?;
    sdk.init(options).map_err(Into::into)
}

#[wasm_bindgen]
pub fn sdk_get_advertising_token(sdk_id: String) -> JsResult<Option<String>> {
    Ok(with_sdk(&sdk_id)?.get_advertising_token())
}

#[wasm_bindgen]
pub fn sdk_get_advertising_token_async(sdk_id: String) -> JsResult<js_sys::Promise> {
    let pending = with_sdk(&sdk_id)?.get_advertising_token_async();
    Ok(wasm_bindgen_futures::future_to_promise(async move {
        pending
            .await
            .map(JsValue::from)
            .map_err(|e| js_sys::Error::new(&e.to_string()).into())
    }))
}

#[wasm_bindgen]
pub fn sdk_get_identity(sdk_id: String) -> JsResult<JsValue> {
    let identity = with_sdk(&sdk_id)?.get_identity();
    to_js(&identity)
}

#[wasm_bindgen]
pub fn sdk_is_identity_available(sdk_id: String) -> JsResult<bool> {
    Ok(with_sdk(&sdk_id)?.is_identity_available())
}

#[wasm_bindgen]
pub fn sdk_is_login_required(sdk_id: String) -> JsResult<Option<bool>> {
    Ok(with_sdk(&sdk_id)?.is_login_required())
}

#[wasm_bindgen]
pub fn sdk_has_opted_out(sdk_id: String) -> JsResult<bool> {
    Ok(with_sdk(&sdk_id)?.has_opted_out())
}

#[wasm_bindgen]
pub fn sdk_is_initialized(sdk_id: String) -> JsResult<bool> {
    Ok(with_sdk(&sdk_id)?.is_initialized())
}

#[wasm_bindgen]
pub fn sdk_set_identity(sdk_id: String, identity: JsValue) -> JsResult<()> {
    let sdk = with_sdk(&sdk_id)?;
    let identity = persisted_from_js(identity)?;
    sdk.set_identity(identity).map_err(Into::into)
}

/// Общая обёртка CSTG-сеттеров: ошибки становятся rejected Promise
fn client_side_promise<F, Fut>(sdk_id: &str, opts: JsValue, call: F) -> JsResult<js_sys::Promise>
where
    F: FnOnce(Sdk, ClientSideIdentityOptions) -> Fut + 'static,
    Fut: std::future::Future<Output = crate::utils::error::Result<()>> + 'static,
{
    let sdk = with_sdk(sdk_id)?;
    let options = cstg_options_from_js(opts)?;
    Ok(wasm_bindgen_futures::future_to_promise(async move {
        call(sdk, options)
            .await
            .map(|_| JsValue::UNDEFINED)
            .map_err(JsValue::from)
    }))
}

#[wasm_bindgen]
pub fn sdk_set_identity_from_email(sdk_id: String, email: String, opts: JsValue) -> JsResult<js_sys::Promise> {
    client_side_promise(&sdk_id, opts, move |sdk, options| async move {
        sdk.set_identity_from_email(&email, &options).await
    })
}

#[wasm_bindgen]
pub fn sdk_set_identity_from_email_hash(sdk_id: String, email_hash: String, opts: JsValue) -> JsResult<js_sys::Promise> {
    client_side_promise(&sdk_id, opts, move |sdk, options| async move {
        sdk.set_identity_from_email_hash(&email_hash, &options).await
    })
}

#[wasm_bindgen]
pub fn sdk_set_identity_from_phone(sdk_id: String, phone: String, opts: JsValue) -> JsResult<js_sys::Promise> {
    client_side_promise(&sdk_id, opts, move |sdk, options| async move {
        sdk.set_identity_from_phone(&phone, &options).await
    })
}

#[wasm_bindgen]
pub fn sdk_set_identity_from_phone_hash(sdk_id: String, phone_hash: String, opts: JsValue) -> JsResult<js_sys::Promise> {
    client_side_promise(&sdk_id, opts, move |sdk, options| async move {
        sdk.set_identity_from_phone_hash(&phone_hash, &options).await
    })
}

/// Подписаться на события: `callback(eventName, { identity })`
#[wasm_bindgen]
pub fn sdk_subscribe(sdk_id: String, callback: js_sys::Function) -> JsResult<()> {
    let sdk = with_sdk(&sdk_id)?;
    sdk.subscribe(Rc::new(move |event: SdkEvent, payload: &EventPayload| {
        let value = match to_js(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("failed to convert event payload: {:?}", e);
                return;
            }
        };
        if let Err(e) = callback.call2(&JsValue::NULL, &JsValue::from_str(event.as_str()), &value) {
            tracing::error!("subscriber threw while handling {}: {:?}", event.as_str(), e);
        }
    }));
    Ok(())
}

#[wasm_bindgen]
pub fn sdk_disconnect(sdk_id: String) -> JsResult<()> {
    with_sdk(&sdk_id)?.disconnect();
    Ok(())
}

#[wasm_bindgen]
pub fn sdk_abort(sdk_id: String) -> JsResult<()> {
    with_sdk(&sdk_id)?.abort();
    Ok(())
}
