//! Core of the delegated account recovery protocol: the binary token codec,
//! ECDSA P-256 signing and verification, and the validated token types.
//!
//! An account provider issues a signed [`RecoveryToken`] and deposits it with
//! a recovery provider the user trusts. During recovery the recovery provider
//! returns the original token wrapped inside a [`CountersignedToken`], whose
//! fallible constructor performs the full validation pipeline. No long-term
//! shared secrets are involved; each side verifies the other's signatures.
//!
//! HTTP, persistence, and configuration discovery live in the companion
//! crates. Everything here is pure and in-memory.

mod countersigned;
mod error;
mod keys;
mod origin;
mod replay;
mod token;

pub use countersigned::CountersignedToken;
pub use error::TokenError;
pub use keys::{
    generate_signing_key, signing_key_from_base64, signing_key_from_pem, verifying_key_from_base64,
    verifying_key_from_pem, verifying_key_from_spki, verifying_key_to_base64, verifying_key_to_pem,
    verifying_key_to_spki, SPKI_PREFIX,
};
pub use origin::validate_origin;
pub use replay::{MemoryReplayGuard, ReplayGuard};
pub use token::{
    new_token_id, RecoveryToken, LOW_FRICTION_REQUESTED, NO_OPTIONS, STATUS_REQUESTED,
    TOKEN_ID_LENGTH, TYPE_COUNTERSIGNED_TOKEN, TYPE_RECOVERY_TOKEN, VERSION,
};

// Re-exported so downstream crates spell key types the same way this crate does.
pub use p256::ecdsa::{SigningKey, VerifyingKey};
