use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Failed to generate keys: {0}")]
    KeyGenerationError(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("AEAD encryption failed: {0}")]
    AeadEncryptionError(String),
    #[error("AEAD decryption failed: {0}")]
    AeadDecryptionError(String),
    #[error("Invalid key length: {0} bytes")]
    InvalidKeyLength(usize),
    #[error("Invalid input: {0}")]
    InvalidInputError(String),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidInputError(format!("Base64 decode failed: {}", err))
    }
}

impl From<p256::pkcs8::spki::Error> for CryptoError {
    fn from(err: p256::pkcs8::spki::Error) -> Self {
        CryptoError::InvalidPublicKey(err.to_string())
    }
}
