//! Account-provider side of delegated account recovery: token record
//! lifecycle, the recover-account-return engine, and the well-known HTTP
//! surface.
//!
//! The account provider keeps a small record per issued token (id, the
//! recovery provider it was deposited with, username, and a hash of the
//! token bytes) so the countersigned token coming back during recovery can
//! be rejoined to an account without re-validating the inner token or
//! holding long-term encryption keys.

mod record;
mod recovery;
mod status;
mod surface;

pub use record::{MemoryTokenRecordStore, TokenRecord, TokenRecordStatus, TokenRecordStore};
pub use recovery::{recover_account, ProviderError, RecoveredAccount};
pub use status::{
    apply_token_status, handle_save_token_return, issue_recovery_token, SaveTokenOutcome,
    TokenStatus,
};
pub use surface::ProviderSurface;
