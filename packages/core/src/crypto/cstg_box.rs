// ECDH (P-256) + AES-256-GCM для Client-Side Token Generation
//
// Клиент генерирует эфемерную пару ключей, общий секрет с публичным ключом
// сервера используется напрямую как ключ AES-256-GCM.

use super::envelope::{decrypt_envelope_bytes, encrypt_with_key, random_iv};
use crate::error::CryptoError;
use crate::utils::b64;
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::PublicKey;
use rand_core::OsRng;
use zeroize::Zeroizing;

pub struct CstgBox {
    shared_key: Zeroizing<Vec<u8>>,
    client_public_key: Vec<u8>,
}

impl CstgBox {
    /// Построить box из SPKI ключа сервера (base64, без продуктового префикса)
    pub fn derive(server_public_key_b64: &str) -> Result<Self, CryptoError> {
        let der = b64::decode(server_public_key_b64.trim())?;
        let server_key = PublicKey::from_public_key_der(&der)?;

        let client_secret = EphemeralSecret::random(&mut OsRng);
        let client_public_key = client_secret
            .public_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGenerationError(e.to_string()))?
            .as_bytes()
            .to_vec();

        let shared = client_secret.diffie_hellman(&server_key);
        let shared_key = Zeroizing::new(shared.raw_secret_bytes().to_vec());

        Ok(Self {
            shared_key,
            client_public_key,
        })
    }

    /// SPKI DER эфемерного публичного ключа клиента
    pub fn client_public_key(&self) -> &[u8] {
        &self.client_public_key
    }

    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let iv = random_iv();
        let ciphertext = encrypt_with_key(&self.shared_key, &iv, plaintext, aad)?;
        Ok((iv, ciphertext))
    }

    /// Расшифровать `IV || ciphertext` из ответа сервера
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
        decrypt_envelope_bytes(&self.shared_key, envelope, &[])
    }
}

impl std::fmt::Debug for CstgBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CstgBox")
            .field("client_public_key", &b64::encode(&self.client_public_key))
            .finish_non_exhaustive()
    }
}
