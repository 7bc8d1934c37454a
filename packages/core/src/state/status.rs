// Классификация состояния идентичности

use crate::storage::models::{Identity, PersistedIdentity};
use serde::{Serialize, Serializer};

/// Статус, который получает init callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum IdentityStatus {
    Established = 0,
    Refreshed = 1,
    Expired = 100,
    NoIdentity = -1,
    Invalid = -2,
    RefreshExpired = -3,
    Optout = -4,
}

impl IdentityStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Текст статуса по умолчанию
    pub fn text(self) -> &'static str {
        match self {
            IdentityStatus::Established => "Identity established",
            IdentityStatus::Refreshed => "Identity refreshed",
            IdentityStatus::Expired => "Identity expired, refresh still valid",
            IdentityStatus::NoIdentity => "Identity not available",
            IdentityStatus::Invalid => "Invalid identity",
            IdentityStatus::RefreshExpired => "Identity expired, refresh expired",
            IdentityStatus::Optout => "User has opted out",
        }
    }

    /// EXPIRED считается валидным: идентичность ещё можно обновить
    pub fn is_valid(self) -> bool {
        matches!(
            self,
            IdentityStatus::Established | IdentityStatus::Refreshed | IdentityStatus::Expired
        )
    }
}

impl Serialize for IdentityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Результат классификации
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityValidity {
    pub valid: bool,
    pub status: IdentityStatus,
    pub error_message: &'static str,
    /// Заполнено только для валидных статусов
    pub identity: Option<Identity>,
}

impl IdentityValidity {
    fn invalid(status: IdentityStatus) -> Self {
        Self {
            valid: false,
            status,
            error_message: status.text(),
            identity: None,
        }
    }

    fn valid(status: IdentityStatus, identity: &Identity) -> Self {
        Self {
            valid: true,
            status,
            error_message: status.text(),
            identity: Some(identity.clone()),
        }
    }
}

/// Классифицировать кандидата относительно `now`.
///
/// `first_identity` - экземпляр ещё не видел ни одной валидной идентичности
/// (ESTABLISHED вместо REFRESHED).
pub fn get_identity_status(
    candidate: Option<&PersistedIdentity>,
    now: i64,
    first_identity: bool,
) -> IdentityValidity {
    let identity = match candidate {
        None => return IdentityValidity::invalid(IdentityStatus::NoIdentity),
        Some(PersistedIdentity::Optout(_)) => {
            return IdentityValidity::invalid(IdentityStatus::Optout)
        }
        Some(PersistedIdentity::Identity(identity)) => identity,
    };

    if identity.advertising_token.is_empty() || identity.refresh_token.is_empty() {
        return IdentityValidity::invalid(IdentityStatus::Invalid);
    }
    if identity.refresh_expires <= now {
        return IdentityValidity::invalid(IdentityStatus::RefreshExpired);
    }
    if identity.identity_expires <= now {
        return IdentityValidity::valid(IdentityStatus::Expired, identity);
    }

    let status = if first_identity {
        IdentityStatus::Established
    } else {
        IdentityStatus::Refreshed
    };
    IdentityValidity::valid(status, identity)
}
