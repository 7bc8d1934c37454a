// WASM bindings: вспомогательные функции без экземпляра SDK

use wasm_bindgen::prelude::*;
use crate::protocol::validation;
use crate::state::get_identity_status;
use crate::storage::PersistedIdentity;
use crate::utils::error::SdkError;

/// Нормализовать email так же, как это делает setIdentityFromEmail
#[wasm_bindgen]
pub fn normalize_email(email: String) -> Option<String> {
    validation::normalize_email(&email)
}

/// SHA-256 + base64 (email уже нормализован, телефон в E.164)
#[wasm_bindgen]
pub fn hash_and_encode(value: String) -> String {
    validation::hash_and_encode(&value)
}

#[wasm_bindgen]
pub fn is_normalized_phone(phone: String) -> bool {
    validation::is_normalized_phone(&phone)
}

#[wasm_bindgen]
pub fn is_base64_hash(value: String) -> bool {
    validation::is_base64_hash(&value)
}

/// Код IdentityStatus для произвольного объекта идентичности на момент `now_ms`
#[wasm_bindgen]
pub fn identity_status(identity: JsValue, now_ms: f64) -> Result<i32, JsValue> {
    let candidate = if identity.is_undefined() || identity.is_null() {
        None
    } else {
        let value: serde_json::Value =
            serde_wasm_bindgen::from_value(identity).map_err(SdkError::from)?;
        PersistedIdentity::from_value(value)
    };
    Ok(get_identity_status(candidate.as_ref(), now_ms as i64, true).status.code())
}

/// Версия SDK (входит в параметр `client` запросов)
#[wasm_bindgen]
pub fn sdk_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
