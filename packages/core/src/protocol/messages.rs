// Типы сообщений протокола
// Соответствуют эндпоинтам /v2/token/refresh и /v2/token/client-generate

use crate::storage::models::{is_valid_identity, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ответ `/v2/token/refresh` (после расшифровки, если она нужна)
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshResponse {
    Success { body: Value },
    Optout,
    ExpiredToken,
}

/// Ответ `/v2/token/client-generate`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CstgResponse {
    Success { body: Value },
    Optout,
    ClientError { message: String },
    InvalidHttpOrigin { message: String },
}

/// Итог refresh, с которым работает ядро SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshResult {
    Success(Identity),
    Optout,
    ExpiredToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CstgResult {
    Success(Identity),
    Optout,
}

/// Тело запроса CSTG; всё, кроме timestamp, в base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CstgRequest {
    pub payload: String,
    pub iv: String,
    pub public_key: String,
    pub timestamp: i64,
    pub subscription_id: String,
}

/// Шифруемая часть запроса CSTG: `{"email_hash": ...}` или `{"phone_hash": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CstgPlaintext {
    EmailHash(String),
    PhoneHash(String),
}

/// Параметры CSTG от интегратора
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideIdentityOptions {
    pub server_public_key: String,
    pub subscription_id: String,
}

fn identity_from_body(body: Value) -> Result<Identity, String> {
    if !is_valid_identity(&body) {
        return Err("response body is not a valid identity".to_string());
    }
    serde_json::from_value(body).map_err(|e| format!("invalid identity in response: {}", e))
}

/// Разобрать JSON ответа refresh
pub fn parse_refresh_response(json: &[u8]) -> Result<RefreshResult, String> {
    let response: RefreshResponse = serde_json::from_slice(json)
        .map_err(|e| format!("unexpected refresh response: {}", e))?;
    match response {
        RefreshResponse::Success { body } => identity_from_body(body).map(RefreshResult::Success),
        RefreshResponse::Optout => Ok(RefreshResult::Optout),
        RefreshResponse::ExpiredToken => Ok(RefreshResult::ExpiredToken),
    }
}

/// Разобрать JSON ответа CSTG. `client_error` и `invalid_http_origin`
/// возвращаются как есть: их смысл зависит от HTTP-статуса.
pub fn parse_cstg_response(json: &[u8]) -> Result<CstgResponse, String> {
    serde_json::from_slice(json).map_err(|e| format!("unexpected client-generate response: {}", e))
}

impl CstgResponse {
    pub fn into_result(self) -> Result<CstgResult, String> {
        match self {
            CstgResponse::Success { body } => identity_from_body(body).map(CstgResult::Success),
            CstgResponse::Optout => Ok(CstgResult::Optout),
            CstgResponse::ClientError { .. } => {
                Err("unexpected client_error status with HTTP 200".to_string())
            }
            CstgResponse::InvalidHttpOrigin { .. } => {
                Err("unexpected invalid_http_origin status with HTTP 200".to_string())
            }
        }
    }
}
