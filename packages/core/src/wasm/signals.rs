// Регистрация провайдера в googletag.secureSignalProviders / encryptedSignalProviders

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use js_sys::{Array, Function, Object, Reflect};

use super::wasm_api::sdk_registry;
use crate::product::ProductName;
use crate::signals::{SignalBridge, SignalProvider, SignalProviderRegistry};
use crate::utils::error::SdkError;

const SECURE_SIGNAL_PROVIDERS: &str = "secureSignalProviders";
const ENCRYPTED_SIGNAL_PROVIDERS: &str = "encryptedSignalProviders";

/// Массив провайдеров на `window.googletag`; создаётся, если googletag ещё не загружен
struct GoogletagProviders {
    key: &'static str,
}

impl GoogletagProviders {
    fn get_or_create(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
        let existing = Reflect::get(target, &JsValue::from_str(key))?;
        if !existing.is_undefined() && !existing.is_null() {
            return Ok(existing);
        }
        let created: JsValue = if key == "googletag" {
            Object::new().into()
        } else {
            Array::new().into()
        };
        Reflect::set(target, &JsValue::from_str(key), &created)?;
        Ok(created)
    }

    fn provider_list(&self) -> Result<JsValue, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("window is not available"))?;
        let googletag = Self::get_or_create(&window, "googletag")?;
        Self::get_or_create(&googletag, self.key)
    }

    fn to_js(provider: SignalProvider) -> Result<JsValue, JsValue> {
        let collector = provider.collector.clone();
        let collector_function = Closure::<dyn Fn() -> js_sys::Promise>::new(move || {
            let pending = collector();
            wasm_bindgen_futures::future_to_promise(async move {
                Ok(pending.await.map(JsValue::from).unwrap_or(JsValue::UNDEFINED))
            })
        })
        .into_js_value();

        let object = Object::new();
        Reflect::set(&object, &JsValue::from_str("id"), &JsValue::from_str(&provider.id))?;
        Reflect::set(&object, &JsValue::from_str("collectorFunction"), &collector_function)?;
        Ok(object.into())
    }

    fn try_push(&self, provider: SignalProvider) -> Result<(), JsValue> {
        let list = self.provider_list()?;
        let object = Self::to_js(provider)?;
        // googletag подменяет push у своей очереди, поэтому вызываем именно его
        let push: Function = Reflect::get(&list, &JsValue::from_str("push"))?.dyn_into()?;
        push.call1(&list, &object)?;
        Ok(())
    }
}

impl SignalProviderRegistry for GoogletagProviders {
    fn push(&self, provider: SignalProvider) {
        if let Err(e) = self.try_push(provider) {
            tracing::warn!("failed to register signal provider in googletag.{}: {:?}", self.key, e);
        }
    }
}

fn register(product: String, key: &'static str) -> Result<(), JsValue> {
    let product: ProductName = product
        .parse()
        .map_err(|e: String| JsValue::from(SdkError::TypeError(e)))?;
    SignalBridge::new(product, sdk_registry()).register_with(&GoogletagProviders { key });
    Ok(())
}

/// Зарегистрировать провайдера secure signals для продукта
#[wasm_bindgen]
pub fn register_secure_signals(product: String) -> Result<(), JsValue> {
    register(product, SECURE_SIGNAL_PROVIDERS)
}

/// То же для encryptedSignalProviders
#[wasm_bindgen]
pub fn register_encrypted_signals(product: String) -> Result<(), JsValue> {
    register(product, ENCRYPTED_SIGNAL_PROVIDERS)
}
