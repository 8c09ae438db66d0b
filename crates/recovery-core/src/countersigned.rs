//! Countersigned token validation.

use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::error::TokenError;
use crate::token::{RecoveryToken, TOKEN_ID_LENGTH, TYPE_COUNTERSIGNED_TOKEN};

use base64ct::{Base64, Encoding};

/// A countersigned recovery token that has passed the full validation
/// pipeline.
///
/// The only way to obtain one is [`CountersignedToken::validate`], so holding
/// a value of this type means the checks ran in order and all passed. The
/// `data` field carries the original recovery token; [`Self::inner_token_hash`]
/// is how the account provider rejoins it to the record kept at issuance.
#[derive(Debug, Clone)]
pub struct CountersignedToken {
    inner: RecoveryToken,
}

impl CountersignedToken {
    /// Validate an encoded countersigned token against the current time.
    ///
    /// See [`Self::validate_at`] for the check sequence.
    pub fn validate(
        encoded: &str,
        expected_issuer: &str,
        expected_audience: &str,
        keys: &[VerifyingKey],
        allowed_clock_skew_secs: u64,
        expected_binding: &[u8],
    ) -> Result<Self, TokenError> {
        Self::validate_at(
            encoded,
            expected_issuer,
            expected_audience,
            keys,
            allowed_clock_skew_secs,
            expected_binding,
            Utc::now(),
        )
    }

    /// Validate an encoded countersigned token against an explicit `now`.
    ///
    /// Checks run in fixed order and stop at the first failure:
    /// structure, version and type, issuer, audience, binding, signature,
    /// clock skew. No partial acceptance: the caller either gets a validated
    /// token or an error naming the first check that failed.
    pub fn validate_at(
        encoded: &str,
        expected_issuer: &str,
        expected_audience: &str,
        keys: &[VerifyingKey],
        allowed_clock_skew_secs: u64,
        expected_binding: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let token = RecoveryToken::parse(encoded)?;

        if token.token_type() != TYPE_COUNTERSIGNED_TOKEN {
            return Err(TokenError::Malformed("expected countersigned token type"));
        }
        if token.issuer() != expected_issuer {
            return Err(TokenError::IssuerMismatch {
                expected: expected_issuer.to_string(),
                got: token.issuer().to_string(),
            });
        }
        if token.audience() != expected_audience {
            return Err(TokenError::AudienceMismatch {
                expected: expected_audience.to_string(),
                got: token.audience().to_string(),
            });
        }
        if token.binding() != expected_binding {
            return Err(TokenError::BindingMismatch);
        }
        if !token.is_signature_valid(keys) {
            return Err(TokenError::SignatureInvalid);
        }

        let issued = DateTime::parse_from_rfc3339(token.issued_time())
            .map_err(|_| TokenError::Malformed("unparsable issued time"))?;
        let skew_ms = now
            .timestamp_millis()
            .abs_diff(issued.timestamp_millis());
        let allowed_ms = allowed_clock_skew_secs.saturating_mul(1000) as u128;
        if skew_ms as u128 > allowed_ms {
            return Err(TokenError::TokenExpired {
                skew_secs: (skew_ms / 1000) as u64,
                allowed_secs: allowed_clock_skew_secs,
            });
        }

        Ok(Self { inner: token })
    }

    /// Extract the issuer from an encoded token without validating it, so the
    /// matching recovery provider configuration can be fetched first.
    pub fn extract_issuer(encoded: &str) -> Result<String, TokenError> {
        let decoded =
            Base64::decode_vec(encoded).map_err(|_| TokenError::Malformed("invalid base64"))?;
        // Fixed offset: version, type, id, options.
        let offset = 2 + TOKEN_ID_LENGTH + 1;
        let len_bytes = decoded
            .get(offset..offset + 2)
            .ok_or(TokenError::Malformed("truncated issuer length"))?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let issuer = decoded
            .get(offset + 2..offset + 2 + len)
            .ok_or(TokenError::Malformed("issuer overruns buffer"))?;
        if !issuer.is_ascii() {
            return Err(TokenError::Malformed("non-ascii issuer"));
        }
        String::from_utf8(issuer.to_vec()).map_err(|_| TokenError::Malformed("non-ascii issuer"))
    }

    /// Hex SHA-256 of the `data` field, which carries the original recovery
    /// token.
    pub fn inner_token_hash(&self) -> String {
        hex::encode(Sha256::digest(self.inner.data()))
    }

    /// The validated token.
    pub fn token(&self) -> &RecoveryToken {
        &self.inner
    }
}
