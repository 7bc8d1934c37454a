// Wire format тел запросов и ответов API
//
// refresh v2: base64(IV || AES-GCM(JSON)) при HTTP 200 и наличии ключа,
// иначе открытый JSON. CSTG: JSON-конверт с base64 полями.

use crate::crypto::envelope::decrypt_envelope;
use crate::crypto::CstgBox;
use crate::error::CryptoError;
use crate::protocol::messages::{CstgPlaintext, CstgRequest};
use crate::utils::b64;

/// JSON ответа refresh: расшифровать, если это v2 и HTTP 200
pub fn unpack_refresh_body(
    status: u16,
    body: &str,
    refresh_response_key: Option<&str>,
) -> Result<Vec<u8>, CryptoError> {
    match refresh_response_key {
        Some(key) if status == 200 => decrypt_envelope(key, body),
        _ => Ok(body.as_bytes().to_vec()),
    }
}

/// AAD запроса CSTG: JSON-массив `[timestamp]`
pub fn cstg_aad(timestamp: i64) -> Vec<u8> {
    format!("[{}]", timestamp).into_bytes()
}

/// Зашифровать DII и собрать конверт запроса CSTG
pub fn pack_cstg_request(
    cstg: &CstgBox,
    plaintext: &CstgPlaintext,
    timestamp: i64,
    subscription_id: &str,
) -> Result<CstgRequest, CryptoError> {
    let json = serde_json::to_vec(plaintext)
        .map_err(|e| CryptoError::InvalidInputError(format!("Failed to encode payload: {}", e)))?;
    let (iv, ciphertext) = cstg.encrypt(&json, &cstg_aad(timestamp))?;

    Ok(CstgRequest {
        payload: b64::encode(&ciphertext),
        iv: b64::encode(&iv),
        public_key: b64::encode(cstg.client_public_key()),
        timestamp,
        subscription_id: subscription_id.to_string(),
    })
}

/// Тело ответа CSTG с HTTP 200: base64(IV || ciphertext)
pub fn unpack_cstg_body(cstg: &CstgBox, body: &str) -> Result<Vec<u8>, CryptoError> {
    let envelope = b64::decode(body.trim())?;
    cstg.decrypt(&envelope)
}
