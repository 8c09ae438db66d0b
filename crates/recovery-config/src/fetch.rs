//! Configuration discovery at the well-known path.
//!
//! The HTTP client is a trait so hosts can plug in their own stack (and tests
//! a deterministic fake); [`WellKnownClient`] is the batteries-included
//! blocking implementation. Fetching is the only I/O this workspace performs.

use recovery_core::validate_origin;
use serde_json::Value;

use crate::config::{
    AccountProviderConfiguration, ConfigType, ProviderConfiguration, RecoveryProviderConfiguration,
};
use crate::error::ConfigError;

/// Well-known path at which a provider configuration is published.
pub const CONFIG_PATH: &str = "/.well-known/delegated-account-recovery/configuration";

/// Well-known path at which the token status endpoint must listen.
pub const TOKEN_STATUS_PATH: &str = "/.well-known/delegated-account-recovery/token-status";

/// A fetched HTTP response, reduced to what configuration parsing needs.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Raw `Cache-Control` response header, if present.
    pub cache_control: Option<String>,
}

/// Minimal JSON-over-HTTPS fetcher the discovery step runs on.
pub trait HttpsClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, ConfigError>;
}

/// Blocking HTTPS client with a fixed request timeout.
pub struct WellKnownClient {
    http: reqwest::blocking::Client,
}

impl WellKnownClient {
    pub fn new() -> Result<Self, ConfigError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Fetch(e.to_string()))?;
        Ok(Self { http })
    }
}

impl HttpsClient for WellKnownClient {
    fn get(&self, url: &str) -> Result<HttpResponse, ConfigError> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| ConfigError::Fetch(e.to_string()))?;
        let status = response.status().as_u16();
        let cache_control = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .map_err(|e| ConfigError::Fetch(e.to_string()))?
            .to_vec();
        Ok(HttpResponse {
            status,
            body,
            cache_control,
        })
    }
}

/// Fetch and parse a provider configuration from its well-known location.
///
/// Validates the origin, requires a 2xx JSON response, and applies the
/// `max-age` from the `Cache-Control` response header when present (one hour
/// otherwise). The result is typed per `config_type`.
pub fn fetch_configuration(
    origin: &str,
    config_type: ConfigType,
    client: &dyn HttpsClient,
) -> Result<ProviderConfiguration, ConfigError> {
    let origin = origin.to_ascii_lowercase();
    validate_origin(&origin)?;

    let url = format!("{origin}{CONFIG_PATH}");
    tracing::debug!(%url, "fetching provider configuration");
    let response = client.get(&url)?;
    if !(200..300).contains(&response.status) {
        return Err(ConfigError::HttpStatus {
            status: response.status,
        });
    }

    let json: Value = serde_json::from_slice(&response.body)?;
    let max_age = response.cache_control.as_deref().and_then(parse_max_age);

    match config_type {
        ConfigType::AccountProvider => AccountProviderConfiguration::from_json(&json, max_age)
            .map(ProviderConfiguration::AccountProvider),
        ConfigType::RecoveryProvider => RecoveryProviderConfiguration::from_json(&json, max_age)
            .map(ProviderConfiguration::RecoveryProvider),
    }
}

/// Extract the `max-age` directive from a `Cache-Control` header value.
fn parse_max_age(header: &str) -> Option<u64> {
    header.split(',').find_map(|directive| {
        let directive = directive.trim();
        let (name, value) = directive.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
