// AES-GCM конверт: base64(IV || ciphertext || tag)
//
// Используется для ответа refresh (ключ `refresh_response_key`) и для
// запроса/ответа CSTG (ключ из ECDH).

use crate::config::Config;
use crate::error::CryptoError;
use crate::utils::b64;
use aes_gcm::{
    aead::{Aead, Payload},
    Aes128Gcm, Aes256Gcm, KeyInit, Nonce,
};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

/// Случайный IV длиной `Config::nonce_length`
pub fn random_iv() -> Vec<u8> {
    let mut iv = vec![0u8; Config::global().nonce_length];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Зашифровать `plaintext`; tag дописывается в конец ciphertext
pub fn encrypt_with_key(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_iv(iv)?;
    let nonce = Nonce::from_slice(iv);
    let payload = Payload { msg: plaintext, aad };

    let result = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
            .encrypt(nonce, payload),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
            .encrypt(nonce, payload),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };

    result.map_err(|e| CryptoError::AeadEncryptionError(e.to_string()))
}

pub fn decrypt_with_key(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_iv(iv)?;
    if ciphertext.len() < Config::global().gcm_tag_length {
        return Err(CryptoError::AeadDecryptionError(
            "ciphertext shorter than authentication tag".to_string(),
        ));
    }
    let nonce = Nonce::from_slice(iv);
    let payload = Payload { msg: ciphertext, aad };

    let result = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
            .decrypt(nonce, payload),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
            .decrypt(nonce, payload),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };

    result.map_err(|e| CryptoError::AeadDecryptionError(e.to_string()))
}

/// Разделить `IV || ciphertext` и расшифровать
pub fn decrypt_envelope_bytes(key: &[u8], envelope: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let nonce_len = Config::global().nonce_length;
    if envelope.len() < nonce_len {
        return Err(CryptoError::InvalidInputError(format!(
            "envelope too short: {} bytes",
            envelope.len()
        )));
    }
    let (iv, ciphertext) = envelope.split_at(nonce_len);
    decrypt_with_key(key, iv, ciphertext, aad)
}

/// Расшифровать ответ refresh: ключ и тело в base64, AAD пустой
pub fn decrypt_envelope(key_b64: &str, body_b64: &str) -> Result<Vec<u8>, CryptoError> {
    let key = Zeroizing::new(b64::decode(key_b64.trim())?);
    let envelope = b64::decode(body_b64.trim())?;
    decrypt_envelope_bytes(&key, &envelope, &[])
}

/// Собрать base64(IV || ciphertext); обратная операция к `decrypt_envelope`
pub fn encrypt_envelope(key: &[u8], plaintext: &[u8]) -> Result<String, CryptoError> {
    let iv = random_iv();
    let mut envelope = iv.clone();
    envelope.extend(encrypt_with_key(key, &iv, plaintext, &[])?);
    Ok(b64::encode(&envelope))
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    let expected = Config::global().nonce_length;
    if iv.len() != expected {
        return Err(CryptoError::InvalidInputError(format!(
            "IV must be {} bytes, got {}",
            expected,
            iv.len()
        )));
    }
    Ok(())
}
