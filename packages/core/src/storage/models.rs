// Модели данных идентичности
//
// Значения хранятся в cookie / localStorage в том же JSON-формате, в каком
// их отдаёт API, поэтому имена полей snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const REQUIRED_IDENTITY_FIELDS: [&str; 5] = [
    "advertising_token",
    "refresh_token",
    "identity_expires",
    "refresh_from",
    "refresh_expires",
];

/// Набор токенов, выданный API (или переданный интегратором в `init`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub advertising_token: String,
    pub refresh_token: String,
    /// Ключ для расшифровки ответа refresh (v2). Отсутствует у v1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_response_key: Option<String>,
    pub identity_expires: i64,
    pub refresh_from: i64,
    pub refresh_expires: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptoutStatus {
    #[serde(rename = "optout")]
    Optout,
}

/// Маркер отказа пользователя
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptoutIdentity {
    pub status: OptoutStatus,
    pub identity_expires: i64,
    pub refresh_expires: i64,
}

impl OptoutIdentity {
    pub fn new(expires: i64) -> Self {
        Self {
            status: OptoutStatus::Optout,
            identity_expires: expires,
            refresh_expires: expires,
        }
    }
}

/// То, что лежит в хранилище: идентичность или маркер optout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedIdentity {
    Optout(OptoutIdentity),
    Identity(Identity),
}

impl PersistedIdentity {
    pub fn identity_expires(&self) -> i64 {
        match self {
            PersistedIdentity::Optout(optout) => optout.identity_expires,
            PersistedIdentity::Identity(identity) => identity.identity_expires,
        }
    }

    pub fn refresh_expires(&self) -> i64 {
        match self {
            PersistedIdentity::Optout(optout) => optout.refresh_expires,
            PersistedIdentity::Identity(identity) => identity.refresh_expires,
        }
    }

    pub fn as_identity(&self) -> Option<&Identity> {
        match self {
            PersistedIdentity::Identity(identity) => Some(identity),
            PersistedIdentity::Optout(_) => None,
        }
    }

    pub fn is_optout(&self) -> bool {
        matches!(self, PersistedIdentity::Optout(_))
    }

    /// Разобрать произвольный JSON через предикаты формы.
    /// Всё, что не похоже ни на идентичность, ни на optout, даёт `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        if is_optout_identity(&value) {
            return serde_json::from_value(value).ok().map(PersistedIdentity::Optout);
        }
        if is_valid_identity(&value) {
            return serde_json::from_value(value).ok().map(PersistedIdentity::Identity);
        }
        None
    }
}

impl From<Identity> for PersistedIdentity {
    fn from(identity: Identity) -> Self {
        PersistedIdentity::Identity(identity)
    }
}

impl From<OptoutIdentity> for PersistedIdentity {
    fn from(optout: OptoutIdentity) -> Self {
        PersistedIdentity::Optout(optout)
    }
}

/// Структурная проверка: объект со всеми пятью обязательными полями
pub fn is_valid_identity(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| REQUIRED_IDENTITY_FIELDS.iter().all(|f| obj.contains_key(*f)))
        .unwrap_or(false)
}

/// Объект со `status === "optout"`
pub fn is_optout_identity(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some("optout")
}

/// Старый формат cookie: оба токена есть, но полной формы идентичности нет.
/// Недостающие сроки (все или часть) восстанавливаются при миграции.
pub fn is_legacy_identity(value: &Value) -> bool {
    let has_token = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(|token| !token.is_empty())
            .unwrap_or(false)
    };
    has_token("advertising_token")
        && has_token("refresh_token")
        && !is_valid_identity(value)
        && !is_optout_identity(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_valid_identity_requires_all_fields() {
        let full = json!({
            "advertising_token": "a",
            "refresh_token": "r",
            "identity_expires": 1,
            "refresh_from": 1,
            "refresh_expires": 1
        });
        assert!(is_valid_identity(&full));

        let missing = json!({ "advertising_token": "a", "refresh_token": "r" });
        assert!(!is_valid_identity(&missing));
        assert!(!is_valid_identity(&json!("token")));
        assert!(!is_valid_identity(&Value::Null));
    }

    #[test]
    fn test_optout_detection() {
        let optout = json!({ "status": "optout", "identity_expires": 5, "refresh_expires": 5 });
        assert!(is_optout_identity(&optout));
        assert!(!is_optout_identity(&json!({ "status": "success" })));

        let parsed = PersistedIdentity::from_value(optout).unwrap();
        assert!(parsed.is_optout());
        assert_eq!(parsed.refresh_expires(), 5);
    }

    #[test]
    fn test_legacy_shape() {
        let legacy = json!({ "advertising_token": "a", "refresh_token": "r" });
        assert!(is_legacy_identity(&legacy));
        assert!(!is_valid_identity(&legacy));
        assert!(PersistedIdentity::from_value(legacy).is_none());
    }

    #[test]
    fn test_legacy_shape_with_partial_expiry_fields() {
        let partial = json!({
            "advertising_token": "a",
            "refresh_token": "r",
            "identity_expires": 1
        });
        assert!(is_legacy_identity(&partial));
        assert!(PersistedIdentity::from_value(partial).is_none());

        let full = json!({
            "advertising_token": "a",
            "refresh_token": "r",
            "identity_expires": 1,
            "refresh_from": 1,
            "refresh_expires": 1
        });
        assert!(!is_legacy_identity(&full));
        // пустой токен не мигрируется
        assert!(!is_legacy_identity(&json!({ "advertising_token": "", "refresh_token": "r" })));
    }

    #[test]
    fn test_optional_response_key_not_serialized_when_absent() {
        let identity = Identity {
            advertising_token: "a".into(),
            refresh_token: "r".into(),
            refresh_response_key: None,
            identity_expires: 1,
            refresh_from: 1,
            refresh_expires: 1,
        };
        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("refresh_response_key"));
    }
}
