//! Tests for the token envelope crypto
//!
//! This test suite covers:
//! - AES-GCM envelope of refresh responses (128 and 256 bit keys)
//! - ECDH (P-256) key agreement of client-side token generation
//! - Error handling for malformed keys and envelopes

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;
use uid2_core::crypto::envelope::{decrypt_envelope_bytes, encrypt_envelope, random_iv};
use uid2_core::crypto::{decrypt_envelope, decrypt_with_key, encrypt_with_key, CstgBox};
use uid2_core::error::CryptoError;
use uid2_core::protocol::wire::{cstg_aad, pack_cstg_request, unpack_cstg_body};
use uid2_core::protocol::CstgPlaintext;

/// Refresh response encrypted by the operator with a 16-byte key
#[test]
fn test_refresh_envelope_with_aes128_key() {
    let key = [3u8; 16];
    let body = encrypt_envelope(&key, br#"{"status":"optout"}"#).unwrap();

    let plain = decrypt_envelope(&STANDARD.encode(key), &body).unwrap();
    assert_eq!(plain, br#"{"status":"optout"}"#);
}

/// Layout is IV (12 bytes) || ciphertext || tag (16 bytes)
#[test]
fn test_envelope_layout() {
    let key = [9u8; 32];
    let plaintext = b"identity";
    let envelope = STANDARD.decode(encrypt_envelope(&key, plaintext).unwrap()).unwrap();

    assert_eq!(envelope.len(), 12 + plaintext.len() + 16);
    let (iv, ciphertext) = envelope.split_at(12);
    assert_eq!(decrypt_with_key(&key, iv, ciphertext, &[]).unwrap(), plaintext);
}

#[test]
fn test_random_iv_is_fresh() {
    let a = random_iv();
    let b = random_iv();
    assert_eq!(a.len(), 12);
    assert_ne!(a, b, "two IVs should not collide");
}

/// Any flipped bit must fail authentication
#[test]
fn test_tampered_envelope_is_rejected() {
    let key = [5u8; 32];
    let mut envelope = STANDARD.decode(encrypt_envelope(&key, b"token").unwrap()).unwrap();
    let last = envelope.len() - 1;
    envelope[last] ^= 0x01;

    let result = decrypt_envelope_bytes(&key, &envelope, &[]);
    assert!(matches!(result, Err(CryptoError::AeadDecryptionError(_))));
}

#[test]
fn test_wrong_key_is_rejected() {
    let body = encrypt_envelope(&[1u8; 32], b"token").unwrap();
    assert!(decrypt_envelope(&STANDARD.encode([2u8; 32]), &body).is_err());
}

#[test]
fn test_malformed_inputs() {
    // 24-байтовый ключ AES-GCM здесь не используется
    assert!(matches!(
        encrypt_with_key(&[0u8; 24], &[0u8; 12], b"x", &[]),
        Err(CryptoError::InvalidKeyLength(24))
    ));
    // IV неверной длины
    assert!(matches!(
        encrypt_with_key(&[0u8; 32], &[0u8; 16], b"x", &[]),
        Err(CryptoError::InvalidInputError(_))
    ));
    // конверт короче IV
    assert!(matches!(
        decrypt_envelope_bytes(&[0u8; 32], &[0u8; 5], &[]),
        Err(CryptoError::InvalidInputError(_))
    ));
    // не base64
    assert!(decrypt_envelope("a2V5", "!!!").is_err());
}

/// Server side of the client-generate exchange sees the same plaintext
#[test]
fn test_cstg_request_is_readable_by_server() {
    let server = SecretKey::random(&mut OsRng);
    let server_der = server.public_key().to_public_key_der().unwrap();
    let cstg = CstgBox::derive(&STANDARD.encode(server_der.as_bytes())).unwrap();

    let timestamp = 1_700_000_000_000;
    let request = pack_cstg_request(
        &cstg,
        &CstgPlaintext::PhoneHash("hash".to_string()),
        timestamp,
        "subscription",
    )
    .unwrap();
    assert_eq!(request.subscription_id, "subscription");
    assert_eq!(request.timestamp, timestamp);

    let client = PublicKey::from_public_key_der(&STANDARD.decode(&request.public_key).unwrap()).unwrap();
    let shared = p256::ecdh::diffie_hellman(server.to_nonzero_scalar(), client.as_affine());
    let iv = STANDARD.decode(&request.iv).unwrap();
    let payload = STANDARD.decode(&request.payload).unwrap();

    let plain = decrypt_with_key(shared.raw_secret_bytes(), &iv, &payload, &cstg_aad(timestamp)).unwrap();
    assert_eq!(plain, br#"{"phone_hash":"hash"}"#);

    // AAD привязан к timestamp
    assert!(decrypt_with_key(shared.raw_secret_bytes(), &iv, &payload, &cstg_aad(timestamp + 1)).is_err());
}

/// Response from the server decrypts with the box that made the request
#[test]
fn test_cstg_response_is_readable_by_client() {
    let server = SecretKey::random(&mut OsRng);
    let server_der = server.public_key().to_public_key_der().unwrap();
    let cstg = CstgBox::derive(&STANDARD.encode(server_der.as_bytes())).unwrap();

    let client = PublicKey::from_public_key_der(cstg.client_public_key()).unwrap();
    let shared = p256::ecdh::diffie_hellman(server.to_nonzero_scalar(), client.as_affine());
    let body = encrypt_envelope(shared.raw_secret_bytes(), br#"{"status":"optout"}"#).unwrap();

    assert_eq!(unpack_cstg_body(&cstg, &body).unwrap(), br#"{"status":"optout"}"#);

    // другой эфемерный ключ не подходит
    let other = CstgBox::derive(&STANDARD.encode(server_der.as_bytes())).unwrap();
    assert_ne!(other.client_public_key(), cstg.client_public_key());
    assert!(unpack_cstg_body(&other, &body).is_err());
}

#[test]
fn test_cstg_rejects_bad_server_key() {
    let result = CstgBox::derive(&STANDARD.encode(b"not a SubjectPublicKeyInfo"));
    assert!(matches!(result, Err(CryptoError::InvalidPublicKey(_))));
}
