use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: expected object")]
    NotAnObject,

    #[error("invalid configuration: missing {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field} URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("configuration fetch failed: {0}")]
    Fetch(String),

    #[error("configuration endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Token(#[from] recovery_core::TokenError),
}
