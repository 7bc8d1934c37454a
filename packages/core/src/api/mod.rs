// Клиент API операторов UID2 / EUID
// refresh и client-side token generation поверх HttpTransport

pub mod client;

pub use client::ApiClient;

use crate::error::CryptoError;
use crate::protocol::TransportError;
use thiserror::Error;

/// Ошибки сетевых операций SDK
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Запрос отменён через `abort_active_requests`
    #[error("Request aborted")]
    Aborted,

    #[error("Client error: {0}")]
    ClientError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("API error: Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ApiError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }
}
