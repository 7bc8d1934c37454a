// Параметры продукта (UID2 / EUID)
// Один и тот же движок обслуживает оба продукта; различаются только данные.

use serde::{Deserialize, Serialize};

/// Продукт, для которого экземпляр SDK выпускает токены
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductName {
    #[serde(rename = "UID2")]
    Uid2,
    #[serde(rename = "EUID")]
    Euid,
}

impl ProductName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductName::Uid2 => "UID2",
            ProductName::Euid => "EUID",
        }
    }
}

impl std::fmt::Display for ProductName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UID2" => Ok(ProductName::Uid2),
            "EUID" => Ok(ProductName::Euid),
            other => Err(format!("Unknown product: {}", other)),
        }
    }
}

/// Данные продукта
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetails {
    pub name: ProductName,
    pub client_name: &'static str,
    pub cookie_name: &'static str,
    pub local_storage_key: &'static str,
    pub default_base_url: &'static str,
    pub signal_provider_id: &'static str,
}

impl ProductDetails {
    pub fn uid2() -> Self {
        Self {
            name: ProductName::Uid2,
            client_name: "uid2",
            cookie_name: "__uid_2",
            local_storage_key: "UID2-sdk-identity",
            default_base_url: "https://prod.uidapi.com",
            signal_provider_id: "uidapi.com",
        }
    }

    pub fn euid() -> Self {
        Self {
            name: ProductName::Euid,
            client_name: "euid",
            cookie_name: "__euid",
            local_storage_key: "EUID-sdk-identity",
            default_base_url: "https://prod.euid.eu",
            signal_provider_id: "euid.eu",
        }
    }

    pub fn for_product(name: ProductName) -> Self {
        match name {
            ProductName::Uid2 => Self::uid2(),
            ProductName::Euid => Self::euid(),
        }
    }

    /// Значение параметра `client` во всех запросах к API
    pub fn client_id(&self) -> String {
        format!("{}-sdk-{}", self.client_name, env!("CARGO_PKG_VERSION"))
    }

    pub fn config_cookie_name(&self) -> String {
        format!("{}_config", self.cookie_name)
    }

    pub fn config_local_storage_key(&self) -> String {
        format!("{}_config", self.local_storage_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_storage_names() {
        let uid2 = ProductDetails::uid2();
        assert_eq!(uid2.cookie_name, "__uid_2");
        assert_eq!(uid2.local_storage_key, "UID2-sdk-identity");
        assert_eq!(uid2.config_cookie_name(), "__uid_2_config");

        let euid = ProductDetails::euid();
        assert_eq!(euid.cookie_name, "__euid");
        assert_eq!(euid.config_local_storage_key(), "EUID-sdk-identity_config");
    }

    #[test]
    fn test_client_id_format() {
        let client = ProductDetails::uid2().client_id();
        assert!(client.starts_with("uid2-sdk-"));
        assert!(ProductDetails::euid().client_id().starts_with("euid-sdk-"));
    }

    #[test]
    fn test_product_name_parsing() {
        assert_eq!("uid2".parse::<ProductName>(), Ok(ProductName::Uid2));
        assert_eq!("EUID".parse::<ProductName>(), Ok(ProductName::Euid));
        assert!("id5".parse::<ProductName>().is_err());
    }
}
