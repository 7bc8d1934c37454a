// Типы ошибок публичного API
//
// Ошибки использования (неверные опции, вызов до init) возвращаются сразу;
// состояние удалённой идентичности ошибкой не является и передаётся через
// IdentityStatus в callbacks.

use crate::api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    /// Опции неверной формы
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Значение опции вне допустимого диапазона
    #[error("RangeError: {0}")]
    RangeError(String),

    #[error("{0} must be called after init()")]
    NotInitialized(&'static str),

    /// Некорректный email / телефон / хеш
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(error: serde_json::Error) -> Self {
        SdkError::SerializationError(error.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<serde_wasm_bindgen::Error> for SdkError {
    fn from(error: serde_wasm_bindgen::Error) -> Self {
        SdkError::TypeError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

// Для WASM-биндингов: TypeError/RangeError пробрасываются как настоящие JS-исключения
#[cfg(target_arch = "wasm32")]
impl From<SdkError> for wasm_bindgen::JsValue {
    fn from(error: SdkError) -> Self {
        match error {
            SdkError::TypeError(msg) => js_sys::TypeError::new(&msg).into(),
            SdkError::RangeError(msg) => js_sys::RangeError::new(&msg).into(),
            other => js_sys::Error::new(&other.to_string()).into(),
        }
    }
}
