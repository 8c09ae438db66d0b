use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{0:?} is not a valid https origin with no path component")]
    InvalidOrigin(String),

    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("token id must be exactly 16 bytes, got {0}")]
    InvalidTokenId(usize),

    #[error("{field} is {len} bytes, longer than a uint16 length prefix can describe")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("token signature did not verify under any provided key")]
    SignatureInvalid,

    #[error("token issuer {got:?} does not match expected {expected:?}")]
    IssuerMismatch { expected: String, got: String },

    #[error("token audience {got:?} does not match expected {expected:?}")]
    AudienceMismatch { expected: String, got: String },

    #[error("token binding does not match expected binding")]
    BindingMismatch,

    #[error("token issued time is {skew_secs}s from now, outside the allowed {allowed_secs}s window")]
    TokenExpired { skew_secs: u64, allowed_secs: u64 },

    #[error("countersigned token has already been submitted")]
    ReplayDetected,

    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("random number generation failed: {0}")]
    RngFailed(String),
}
