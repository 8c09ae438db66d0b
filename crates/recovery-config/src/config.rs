//! Account-provider and recovery-provider configuration entities.
//!
//! Configurations are immutable after construction; callers observe
//! [`is_expired`](AccountProviderConfiguration::is_expired) and re-fetch
//! rather than mutate. Parsing is strict about required fields (errors cite
//! the field name) and tolerant of unknown ones.

use chrono::{DateTime, Duration, Utc};
use recovery_core::{
    validate_origin, verifying_key_from_base64, verifying_key_to_base64, VerifyingKey,
};
use serde_json::Value;
use url::Url;

use crate::error::ConfigError;

/// Seconds until a fetched configuration is considered stale when the
/// response carries no `Cache-Control: max-age`.
pub const DEFAULT_MAX_AGE_SECS: u64 = 60 * 60;

/// Token size, in bytes, a recovery provider is assumed to accept when its
/// configuration does not say.
pub const DEFAULT_TOKEN_MAX_SIZE: u64 = 8192;

/// Which role a fetched configuration should be instantiated as.
///
/// One published document may carry keys for both roles; it is always
/// constructed in a typed fashion for use in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    AccountProvider,
    RecoveryProvider,
}

/// A typed configuration returned by the fetcher.
#[derive(Debug, Clone)]
pub enum ProviderConfiguration {
    AccountProvider(AccountProviderConfiguration),
    RecoveryProvider(RecoveryProviderConfiguration),
}

impl ProviderConfiguration {
    pub fn issuer(&self) -> &str {
        match self {
            Self::AccountProvider(config) => config.issuer(),
            Self::RecoveryProvider(config) => config.issuer(),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Self::AccountProvider(config) => config.is_expired(),
            Self::RecoveryProvider(config) => config.is_expired(),
        }
    }

    pub fn as_account_provider(&self) -> Option<&AccountProviderConfiguration> {
        match self {
            Self::AccountProvider(config) => Some(config),
            Self::RecoveryProvider(_) => None,
        }
    }

    pub fn as_recovery_provider(&self) -> Option<&RecoveryProviderConfiguration> {
        match self {
            Self::RecoveryProvider(config) => Some(config),
            Self::AccountProvider(_) => None,
        }
    }
}

/// Configuration published by an account provider.
#[derive(Debug, Clone)]
pub struct AccountProviderConfiguration {
    issuer: String,
    save_token_return: Url,
    recover_account_return: Url,
    privacy_policy: Url,
    icon_152px: Option<Url>,
    tokensign_pubkeys: Vec<VerifyingKey>,
    expires_at: DateTime<Utc>,
}

impl AccountProviderConfiguration {
    /// Construct a configuration for publication.
    ///
    /// The first key in `tokensign_pubkeys` is the current signing key;
    /// later entries are previous keys still inside their validity window.
    pub fn new(
        issuer: &str,
        save_token_return: &str,
        recover_account_return: &str,
        privacy_policy: &str,
        icon_152px: Option<&str>,
        tokensign_pubkeys: Vec<VerifyingKey>,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.to_ascii_lowercase();
        validate_origin(&issuer)?;
        Ok(Self {
            issuer,
            save_token_return: parse_url("save-token-return", save_token_return)?,
            recover_account_return: parse_url("recover-account-return", recover_account_return)?,
            privacy_policy: parse_url("privacy-policy", privacy_policy)?,
            icon_152px: icon_152px.and_then(|url| Url::parse(url).ok()),
            tokensign_pubkeys,
            expires_at: expiry_from(None),
        })
    }

    /// Parse a configuration fetched from a third party.
    ///
    /// `max_age` comes from the `Cache-Control` response header when the
    /// fetch saw one; the default is one hour.
    pub fn from_json(json: &Value, max_age: Option<u64>) -> Result<Self, ConfigError> {
        let obj = json.as_object().ok_or(ConfigError::NotAnObject)?;
        let issuer = parse_issuer(obj)?;
        Ok(Self {
            issuer,
            save_token_return: get_url(obj, "save-token-return")?,
            recover_account_return: get_url(obj, "recover-account-return")?,
            privacy_policy: get_url(obj, "privacy-policy")?,
            icon_152px: get_optional_url(obj, "icon-152px"),
            tokensign_pubkeys: keys_from_json(obj, "tokensign-pubkeys-secp256r1")?,
            expires_at: expiry_from(max_age),
        })
    }

    /// The published JSON form, keys re-wrapped as base64 SPKI DER.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("issuer".to_string(), Value::from(self.issuer.as_str()));
        obj.insert(
            "save-token-return".to_string(),
            Value::from(self.save_token_return.as_str()),
        );
        obj.insert(
            "recover-account-return".to_string(),
            Value::from(self.recover_account_return.as_str()),
        );
        obj.insert(
            "privacy-policy".to_string(),
            Value::from(self.privacy_policy.as_str()),
        );
        if let Some(icon) = &self.icon_152px {
            obj.insert("icon-152px".to_string(), Value::from(icon.as_str()));
        }
        obj.insert(
            "tokensign-pubkeys-secp256r1".to_string(),
            Value::from(
                self.tokensign_pubkeys
                    .iter()
                    .map(|key| Value::from(verifying_key_to_base64(key)))
                    .collect::<Vec<_>>(),
            ),
        );
        Value::Object(obj)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn save_token_return(&self) -> &Url {
        &self.save_token_return
    }

    pub fn recover_account_return(&self) -> &Url {
        &self.recover_account_return
    }

    pub fn privacy_policy(&self) -> &Url {
        &self.privacy_policy
    }

    pub fn icon_152px(&self) -> Option<&Url> {
        self.icon_152px.as_ref()
    }

    pub fn tokensign_pubkeys(&self) -> &[VerifyingKey] {
        &self.tokensign_pubkeys
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the configuration is stale and should be re-fetched.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Configuration published by a recovery provider.
#[derive(Debug, Clone)]
pub struct RecoveryProviderConfiguration {
    issuer: String,
    save_token: Url,
    recover_account: Url,
    save_token_async_api_iframe: Option<Url>,
    privacy_policy: Url,
    icon_152px: Option<Url>,
    token_max_size: u64,
    countersign_pubkeys: Vec<VerifyingKey>,
    expires_at: DateTime<Utc>,
}

impl RecoveryProviderConfiguration {
    /// Parse a configuration fetched from a recovery provider.
    pub fn from_json(json: &Value, max_age: Option<u64>) -> Result<Self, ConfigError> {
        let obj = json.as_object().ok_or(ConfigError::NotAnObject)?;
        let issuer = parse_issuer(obj)?;
        Ok(Self {
            issuer,
            save_token: get_url(obj, "save-token")?,
            recover_account: get_url(obj, "recover-account")?,
            save_token_async_api_iframe: get_optional_url(obj, "save-token-async-api-iframe"),
            privacy_policy: get_url(obj, "privacy-policy")?,
            icon_152px: get_optional_url(obj, "icon-152px"),
            token_max_size: obj
                .get("token-max-size")
                .and_then(|v| v.as_u64())
                .unwrap_or(DEFAULT_TOKEN_MAX_SIZE),
            countersign_pubkeys: keys_from_json(obj, "countersign-pubkeys-secp256r1")?,
            expires_at: expiry_from(max_age),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn save_token(&self) -> &Url {
        &self.save_token
    }

    pub fn recover_account(&self) -> &Url {
        &self.recover_account
    }

    pub fn save_token_async_api_iframe(&self) -> Option<&Url> {
        self.save_token_async_api_iframe.as_ref()
    }

    pub fn privacy_policy(&self) -> &Url {
        &self.privacy_policy
    }

    pub fn icon_152px(&self) -> Option<&Url> {
        self.icon_152px.as_ref()
    }

    /// Max token size, in bytes, the provider is willing to store.
    pub fn token_max_size(&self) -> u64 {
        self.token_max_size
    }

    pub fn countersign_pubkeys(&self) -> &[VerifyingKey] {
        &self.countersign_pubkeys
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the configuration is stale and should be re-fetched.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

fn parse_issuer(obj: &serde_json::Map<String, Value>) -> Result<String, ConfigError> {
    let issuer = get_string(obj, "issuer")?.to_ascii_lowercase();
    validate_origin(&issuer)?;
    Ok(issuer)
}

fn get_string(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, ConfigError> {
    match obj.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ConfigError::MissingField { field }),
    }
}

fn get_url(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<Url, ConfigError> {
    parse_url(field, &get_string(obj, field)?)
}

fn parse_url(field: &'static str, url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })
}

/// Optional URL field: absent, non-string, or unparsable all mean "not set".
fn get_optional_url(obj: &serde_json::Map<String, Value>, field: &str) -> Option<Url> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Url::parse(s).ok())
}

/// Decode a published key array, skipping entries that fail to parse so a
/// single malformed key cannot take down rotation for the rest of the list.
fn keys_from_json(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Vec<VerifyingKey>, ConfigError> {
    let array = obj
        .get(field)
        .and_then(|v| v.as_array())
        .ok_or(ConfigError::MissingField { field })?;

    let mut keys = Vec::with_capacity(array.len());
    for entry in array {
        let Some(b64) = entry.as_str() else {
            tracing::warn!(field, "skipping non-string public key entry");
            continue;
        };
        match verifying_key_from_base64(b64) {
            Ok(key) => keys.push(key),
            Err(error) => {
                tracing::warn!(field, %error, "skipping malformed public key");
            }
        }
    }
    Ok(keys)
}

fn expiry_from(max_age: Option<u64>) -> DateTime<Utc> {
    let secs = max_age.unwrap_or(DEFAULT_MAX_AGE_SECS);
    Utc::now() + Duration::seconds(secs.min(i64::MAX as u64) as i64)
}
