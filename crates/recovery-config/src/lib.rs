//! Provider configuration model and discovery for delegated account
//! recovery.
//!
//! Both sides of the protocol publish a JSON configuration at
//! `/.well-known/delegated-account-recovery/configuration`. This crate
//! parses and re-emits those documents, decodes the published P-256 key
//! lists, tracks freshness from the `Cache-Control` max-age, and fetches
//! configurations over HTTPS through a pluggable client so tests can
//! substitute a fake.

mod cache;
mod config;
mod error;
mod fetch;

pub use cache::{ConfigCache, MemoryConfigCache};
pub use config::{
    AccountProviderConfiguration, ConfigType, ProviderConfiguration, RecoveryProviderConfiguration,
    DEFAULT_MAX_AGE_SECS, DEFAULT_TOKEN_MAX_SIZE,
};
pub use error::ConfigError;
pub use fetch::{
    fetch_configuration, HttpResponse, HttpsClient, WellKnownClient, CONFIG_PATH,
    TOKEN_STATUS_PATH,
};
