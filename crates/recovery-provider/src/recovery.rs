//! The recover-account-return engine.

use recovery_config::RecoveryProviderConfiguration;
use recovery_core::{CountersignedToken, ReplayGuard, TokenError};
use thiserror::Error;

use crate::record::{TokenRecord, TokenRecordStatus, TokenRecordStore};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("no saved token matches the presented countersigned token")]
    UnknownToken,

    #[error("matching token record is not in confirmed status")]
    TokenNotConfirmed,

    #[error("matching token record belongs to a different user")]
    UsernameMismatch,
}

/// A successfully validated recovery, rejoined to its account.
#[derive(Debug, Clone)]
pub struct RecoveredAccount {
    pub username: String,
    pub record: TokenRecord,
}

/// Validate a countersigned token returned through a recovery provider and
/// rejoin it to the account it recovers.
///
/// The replay guard is consulted (and the token recorded) before anything
/// else, so a token can only ever be accepted once regardless of how the
/// later checks fare. Validation then runs the full countersigned pipeline
/// against the recovery provider's published countersigning keys, and the
/// inner token hash is matched against a **confirmed** record.
///
/// Which check failed is carried in the error for logging; user-facing
/// responses should render a single generic failure message instead of
/// forwarding it.
#[allow(clippy::too_many_arguments)]
pub fn recover_account(
    encoded: &str,
    recovery_provider: &RecoveryProviderConfiguration,
    our_origin: &str,
    allowed_clock_skew_secs: u64,
    expected_binding: &[u8],
    expected_username: Option<&str>,
    replay_guard: &dyn ReplayGuard,
    store: &dyn TokenRecordStore,
) -> Result<RecoveredAccount, ProviderError> {
    if !replay_guard.record(encoded) {
        return Err(TokenError::ReplayDetected.into());
    }

    let token = CountersignedToken::validate(
        encoded,
        recovery_provider.issuer(),
        our_origin,
        recovery_provider.countersign_pubkeys(),
        allowed_clock_skew_secs,
        expected_binding,
    )?;

    let record = store
        .get_by_hash(&token.inner_token_hash())
        .ok_or(ProviderError::UnknownToken)?;
    if record.status != TokenRecordStatus::Confirmed {
        return Err(ProviderError::TokenNotConfirmed);
    }
    if let Some(expected) = expected_username {
        if expected != record.username {
            return Err(ProviderError::UsernameMismatch);
        }
    }

    tracing::info!(username = %record.username, "countersigned token accepted for recovery");
    Ok(RecoveredAccount {
        username: record.username.clone(),
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryTokenRecordStore;
    use crate::status::{issue_recovery_token, TokenStatus};
    use recovery_core::{
        generate_signing_key, new_token_id, verifying_key_to_base64, MemoryReplayGuard,
        RecoveryToken, SigningKey, NO_OPTIONS, STATUS_REQUESTED,
    };
    use serde_json::json;

    const AP: &str = "https://ap.example";
    const RP: &str = "https://rp.example";

    fn rp_config(keys: &[&SigningKey]) -> RecoveryProviderConfiguration {
        let encoded: Vec<String> = keys
            .iter()
            .map(|k| verifying_key_to_base64(k.verifying_key()))
            .collect();
        RecoveryProviderConfiguration::from_json(
            &json!({
                "issuer": RP,
                "save-token": "https://rp.example/save",
                "recover-account": "https://rp.example/recover",
                "privacy-policy": "https://rp.example/privacy",
                "countersign-pubkeys-secp256r1": encoded,
            }),
            None,
        )
        .unwrap()
    }

    struct Scenario {
        rp_key: SigningKey,
        store: MemoryTokenRecordStore,
        countersigned: String,
    }

    /// Issue a token for alice, confirm it, and countersign it as the RP
    /// would during recovery.
    fn scenario() -> Scenario {
        let ap_key = generate_signing_key();
        let rp_key = generate_signing_key();
        let store = MemoryTokenRecordStore::new();
        let token = issue_recovery_token(
            &ap_key,
            "alice",
            AP,
            RP,
            STATUS_REQUESTED,
            b"",
            b"",
            &store,
        )
        .unwrap();
        crate::status::apply_token_status(&store, &token.id_hex(), TokenStatus::SaveSuccess);

        let countersigned = RecoveryToken::countersign(
            &rp_key,
            &token.encode(),
            &new_token_id().unwrap(),
            NO_OPTIONS,
            b"",
        )
        .unwrap()
        .encode();

        Scenario {
            rp_key,
            store,
            countersigned,
        }
    }

    #[test]
    fn confirmed_token_recovers_the_account() {
        let s = scenario();
        let guard = MemoryReplayGuard::new();
        let recovered = recover_account(
            &s.countersigned,
            &rp_config(&[&s.rp_key]),
            AP,
            3600,
            b"",
            None,
            &guard,
            &s.store,
        )
        .unwrap();
        assert_eq!(recovered.username, "alice");
    }

    #[test]
    fn second_submission_is_a_replay() {
        let s = scenario();
        let guard = MemoryReplayGuard::new();
        let config = rp_config(&[&s.rp_key]);

        assert!(recover_account(
            &s.countersigned,
            &config,
            AP,
            3600,
            b"",
            None,
            &guard,
            &s.store
        )
        .is_ok());

        let err = recover_account(
            &s.countersigned,
            &config,
            AP,
            3600,
            b"",
            None,
            &guard,
            &s.store,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Token(TokenError::ReplayDetected)
        ));
    }

    #[test]
    fn replay_guard_runs_before_validation() {
        let s = scenario();
        let guard = MemoryReplayGuard::new();
        guard.record(&s.countersigned);

        // Even a perfectly valid token is refused once seen.
        let err = recover_account(
            &s.countersigned,
            &rp_config(&[&s.rp_key]),
            AP,
            3600,
            b"",
            None,
            &guard,
            &s.store,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Token(TokenError::ReplayDetected)
        ));
    }

    #[test]
    fn unknown_countersigning_key_fails() {
        let s = scenario();
        let stranger = generate_signing_key();
        let err = recover_account(
            &s.countersigned,
            &rp_config(&[&stranger]),
            AP,
            3600,
            b"",
            None,
            &MemoryReplayGuard::new(),
            &s.store,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Token(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn provisional_record_does_not_recover() {
        let ap_key = generate_signing_key();
        let rp_key = generate_signing_key();
        let store = MemoryTokenRecordStore::new();
        let token =
            issue_recovery_token(&ap_key, "alice", AP, RP, 0, b"", b"", &store).unwrap();
        let countersigned = RecoveryToken::countersign(
            &rp_key,
            &token.encode(),
            &new_token_id().unwrap(),
            NO_OPTIONS,
            b"",
        )
        .unwrap()
        .encode();

        let err = recover_account(
            &countersigned,
            &rp_config(&[&rp_key]),
            AP,
            3600,
            b"",
            None,
            &MemoryReplayGuard::new(),
            &store,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::TokenNotConfirmed));
    }

    #[test]
    fn token_with_no_record_is_unknown() {
        let s = scenario();
        let empty_store = MemoryTokenRecordStore::new();
        let err = recover_account(
            &s.countersigned,
            &rp_config(&[&s.rp_key]),
            AP,
            3600,
            b"",
            None,
            &MemoryReplayGuard::new(),
            &empty_store,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownToken));
    }

    #[test]
    fn expected_username_must_match() {
        let s = scenario();
        let config = rp_config(&[&s.rp_key]);

        let err = recover_account(
            &s.countersigned,
            &config,
            AP,
            3600,
            b"",
            Some("mallory"),
            &MemoryReplayGuard::new(),
            &s.store,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::UsernameMismatch));
    }

    #[test]
    fn matching_expected_username_recovers() {
        let s = scenario();
        let recovered = recover_account(
            &s.countersigned,
            &rp_config(&[&s.rp_key]),
            AP,
            3600,
            b"",
            Some("alice"),
            &MemoryReplayGuard::new(),
            &s.store,
        )
        .unwrap();
        assert_eq!(recovered.record.username, "alice");
    }
}
