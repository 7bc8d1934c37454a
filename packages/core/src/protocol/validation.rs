// Валидация и нормализация DII для CSTG

use crate::config::Config;
use crate::product::ProductName;
use crate::protocol::messages::ClientSideIdentityOptions;
use crate::utils::b64;
use crate::utils::error::{Result, SdkError};
use sha2::{Digest, Sha256};

const GMAIL_DOMAIN: &str = "gmail.com";

/// Нормализовать email: trim, lowercase, для gmail.com убрать точки и `+суффикс`.
/// `None`, если адрес некорректен.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }

    let local = if domain == GMAIL_DOMAIN {
        let without_suffix = local.split('+').next().unwrap_or_default();
        without_suffix.replace('.', "")
    } else {
        local.to_string()
    };

    if local.is_empty() {
        return None;
    }
    Some(format!("{}@{}", local, domain))
}

/// `+` и 10-15 цифр (E.164 без разделителей)
pub fn is_normalized_phone(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    (10..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// base64 SHA-256: 44 символа, 32 байта после декодирования
pub fn is_base64_hash(value: &str) -> bool {
    value.len() == Config::global().base64_hash_length
        && b64::decode(value).map(|bytes| bytes.len() == 32).unwrap_or(false)
}

/// SHA-256 -> base64
pub fn hash_and_encode(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    b64::encode(&digest)
}

/// Проверить параметры CSTG
///
/// `server_public_key` должен иметь вид `<PRODUCT>-X-<буква>-<ключ>`.
pub fn validate_client_side_options(
    options: &ClientSideIdentityOptions,
    product: ProductName,
) -> Result<()> {
    let prefix = format!("{}-X-", product.as_str());
    let well_formed = options
        .server_public_key
        .strip_prefix(&prefix)
        .and_then(|rest| {
            let mut chars = rest.chars();
            let letter = chars.next()?;
            let dash = chars.next()?;
            let key = chars.as_str();
            Some(letter.is_ascii_uppercase() && dash == '-' && !key.is_empty())
        })
        .unwrap_or(false);

    if !well_formed {
        return Err(SdkError::TypeError(format!(
            "opts.serverPublicKey must match {}<letter>-<key>",
            prefix
        )));
    }

    if options.subscription_id.trim().is_empty() {
        return Err(SdkError::TypeError("opts.subscriptionId is empty".to_string()));
    }

    Ok(())
}
