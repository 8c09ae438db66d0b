//! Token issuance and lifecycle transitions.

use recovery_core::{new_token_id, RecoveryToken, SigningKey, TokenError};
use sha2::{Digest, Sha256};

use crate::record::{TokenRecord, TokenRecordStatus, TokenRecordStore};

/// Statuses a recovery provider reports about a saved token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    SaveSuccess,
    SaveFailure,
    Deleted,
    TokenRepudiated,
}

impl TokenStatus {
    /// Parse a wire status string. Unknown strings are `None`: the status
    /// callback ignores them rather than erroring.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "save-success" => Some(Self::SaveSuccess),
            "save-failure" => Some(Self::SaveFailure),
            "deleted" => Some(Self::Deleted),
            "token-repudiated" => Some(Self::TokenRepudiated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaveSuccess => "save-success",
            Self::SaveFailure => "save-failure",
            Self::Deleted => "deleted",
            Self::TokenRepudiated => "token-repudiated",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create, sign, and record a new recovery token for a user.
///
/// The record starts `Provisional`; it is confirmed (or deleted) when the
/// recovery provider reports the outcome of the save. The recorded `issuer`
/// is the recovery provider the token is headed to, i.e. the token's audience.
#[allow(clippy::too_many_arguments)]
pub fn issue_recovery_token(
    signing_key: &SigningKey,
    username: &str,
    issuer: &str,
    audience: &str,
    options: u8,
    data: &[u8],
    binding: &[u8],
    store: &dyn TokenRecordStore,
) -> Result<RecoveryToken, TokenError> {
    let id = new_token_id()?;
    let token = RecoveryToken::new(signing_key, &id, options, issuer, audience, data, binding)?;
    store.insert(TokenRecord {
        id: token.id_hex(),
        issuer: token.audience().to_string(),
        username: username.to_string(),
        hash: hex::encode(Sha256::digest(token.to_bytes())),
        status: TokenRecordStatus::Provisional,
    });
    tracing::debug!(id = %token.id_hex(), username, "issued recovery token");
    Ok(token)
}

/// Apply a token-status callback to the record store.
///
/// Unknown ids are silently ignored so the endpoint cannot be used to probe
/// which tokens exist.
pub fn apply_token_status(store: &dyn TokenRecordStore, id: &str, status: TokenStatus) {
    let applied = match status {
        TokenStatus::SaveSuccess => store.set_status(id, TokenRecordStatus::Confirmed),
        TokenStatus::SaveFailure | TokenStatus::Deleted => store.delete(id),
        TokenStatus::TokenRepudiated => store.set_status(id, TokenRecordStatus::Invalid),
    };
    tracing::debug!(id, %status, applied, "token status callback");
}

/// Outcome of a save-token-return landing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTokenOutcome {
    /// The token was saved; the record is confirmed (and any renewed-away
    /// record invalidated).
    Confirmed { username: String },
    /// The save failed; the provisional record was deleted.
    Failed { username: String },
    /// No record matches the returned state.
    UnknownToken { id: String },
}

/// Handle the browser returning from the recovery provider's save flow.
///
/// `state` round-trips through the save: a bare token id, or `newId,oldId`
/// when the new token renews an old one. On success the new record is
/// confirmed and the obsoleted one invalidated in a single store transition.
pub fn handle_save_token_return(
    store: &dyn TokenRecordStore,
    state: &str,
    status: TokenStatus,
) -> SaveTokenOutcome {
    let (new_id, old_id) = match state.split_once(',') {
        Some((new_id, old_id)) => (new_id, Some(old_id)),
        None => (state, None),
    };

    let Some(record) = store.get_by_id(new_id) else {
        return SaveTokenOutcome::UnknownToken {
            id: new_id.to_string(),
        };
    };

    if status == TokenStatus::SaveSuccess {
        store.confirm_replacing(new_id, old_id);
        SaveTokenOutcome::Confirmed {
            username: record.username,
        }
    } else {
        store.delete(new_id);
        SaveTokenOutcome::Failed {
            username: record.username,
        }
    }
}
