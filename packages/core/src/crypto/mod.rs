//! Криптографический модуль
//!
//! Ровно то, что нужно протоколам refresh и CSTG:
//!
//! ```text
//!   refresh:  base64(IV || AES-GCM(JSON))  <- refresh_response_key
//!   CSTG:     ECDH(P-256) -> AES-256-GCM, AAD = [timestamp]
//! ```
//!
//! - [`envelope`]: AES-GCM шифрование/расшифровка и разбор конверта
//! - [`cstg_box`]: эфемерный ECDH с ключом сервера

pub mod cstg_box;
pub mod envelope;

pub use cstg_box::CstgBox;
pub use envelope::{decrypt_envelope, decrypt_with_key, encrypt_with_key};
