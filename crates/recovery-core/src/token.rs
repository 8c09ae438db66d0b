//! Binary token codec, ECDSA signing, and the `RecoveryToken` type.
//!
//! Wire layout (all integers big-endian):
//!
//! ```text
//! uint8    version
//! uint8    type
//! byte[16] id
//! uint8    options
//! uint16   issuer_length       ASCII issuer
//! uint16   audience_length     ASCII audience
//! uint16   issued_time_length  ASCII ISO-8601 issued time
//! uint16   data_length         opaque data
//! uint16   binding_length      channel binding
//! variable signature           ASN.1 DER ECDSA, to end of buffer
//! ```
//!
//! The canonical signing input is every byte preceding `signature`. The whole
//! buffer travels as single-line standard base64.

use chrono::{SecondsFormat, Utc};
use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::error::TokenError;
use crate::origin::validate_origin;

use base64ct::{Base64, Encoding};

/// Mandatory version field value.
pub const VERSION: u8 = 0x00;

/// Token type field for a recovery token.
pub const TYPE_RECOVERY_TOKEN: u8 = 0x00;

/// Token type field for a countersigned recovery token.
pub const TYPE_COUNTERSIGNED_TOKEN: u8 = 0x01;

/// Empty options field.
pub const NO_OPTIONS: u8 = 0x00;

/// Option flag requesting token lifecycle status callbacks.
pub const STATUS_REQUESTED: u8 = 0x01;

/// Option flag requesting low-friction recovery.
pub const LOW_FRICTION_REQUESTED: u8 = 0x02;

/// Token id length in bytes.
pub const TOKEN_ID_LENGTH: usize = 16;

/// A signed recovery token.
///
/// Construct with [`RecoveryToken::new`] (account provider side) or
/// [`RecoveryToken::countersign`] (recovery provider side), or parse one off
/// the wire with [`RecoveryToken::parse`]. Parsing checks structure and
/// origins only; it does not verify the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryToken {
    version: u8,
    token_type: u8,
    id: [u8; TOKEN_ID_LENGTH],
    options: u8,
    issuer: String,
    audience: String,
    issued_time: String,
    data: Vec<u8>,
    binding: Vec<u8>,
    signature: Vec<u8>,
}

impl RecoveryToken {
    /// Construct and sign a new recovery token.
    ///
    /// Sets `version = 0x00`, `type = 0x00`, and `issuedTime` to the current
    /// UTC time at second precision, then signs the canonical byte layout
    /// with `signing_key`.
    pub fn new(
        signing_key: &SigningKey,
        id: &[u8],
        options: u8,
        issuer: &str,
        audience: &str,
        data: &[u8],
        binding: &[u8],
    ) -> Result<Self, TokenError> {
        Self::new_internal(
            signing_key,
            TYPE_RECOVERY_TOKEN,
            id,
            options,
            issuer,
            audience,
            data,
            binding,
            &now_iso8601(),
        )
    }

    /// Wrap an encoded recovery token in a countersigned token.
    ///
    /// The countersigned token carries the decoded original in its `data`
    /// field, swaps issuer and audience relative to the original, and is
    /// signed with the countersigning key.
    pub fn countersign(
        signing_key: &SigningKey,
        inner_encoded: &str,
        id: &[u8],
        options: u8,
        binding: &[u8],
    ) -> Result<Self, TokenError> {
        let inner = Self::parse(inner_encoded)?;
        Self::new_internal(
            signing_key,
            TYPE_COUNTERSIGNED_TOKEN,
            id,
            options,
            inner.audience(),
            inner.issuer(),
            &inner.to_bytes(),
            binding,
            &now_iso8601(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        signing_key: &SigningKey,
        token_type: u8,
        id: &[u8],
        options: u8,
        issuer: &str,
        audience: &str,
        data: &[u8],
        binding: &[u8],
        issued_time: &str,
    ) -> Result<Self, TokenError> {
        if id.len() != TOKEN_ID_LENGTH {
            return Err(TokenError::InvalidTokenId(id.len()));
        }
        validate_origin(issuer)?;
        validate_origin(audience)?;
        check_field_length("issuer", issuer.len())?;
        check_field_length("audience", audience.len())?;
        check_field_length("issued time", issued_time.len())?;
        check_field_length("data", data.len())?;
        check_field_length("binding", binding.len())?;

        let mut id_bytes = [0u8; TOKEN_ID_LENGTH];
        id_bytes.copy_from_slice(id);

        let mut token = Self {
            version: VERSION,
            token_type,
            id: id_bytes,
            options,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            issued_time: issued_time.to_string(),
            data: data.to_vec(),
            binding: binding.to_vec(),
            signature: Vec::new(),
        };

        let signature: Signature = signing_key
            .try_sign(&token.signing_input())
            .map_err(|e| TokenError::SigningFailed(e.to_string()))?;
        token.signature = signature.to_der().as_bytes().to_vec();

        Ok(token)
    }

    /// Parse a base64-encoded token.
    ///
    /// Fails on truncation at any step, a length field overrunning the
    /// buffer, non-ASCII bytes in a string field, or an unknown version or
    /// type byte. Whatever follows the length-prefixed fields is the
    /// signature; it is not verified here.
    pub fn parse(encoded: &str) -> Result<Self, TokenError> {
        let decoded =
            Base64::decode_vec(encoded).map_err(|_| TokenError::Malformed("invalid base64"))?;

        let mut reader = Reader::new(&decoded);

        let version = reader
            .read_u8()
            .ok_or(TokenError::Malformed("truncated version"))?;
        if version != VERSION {
            return Err(TokenError::Malformed("unsupported version"));
        }
        let token_type = reader
            .read_u8()
            .ok_or(TokenError::Malformed("truncated type"))?;
        if token_type != TYPE_RECOVERY_TOKEN && token_type != TYPE_COUNTERSIGNED_TOKEN {
            return Err(TokenError::Malformed("unknown token type"));
        }
        let id_slice = reader
            .read_bytes(TOKEN_ID_LENGTH)
            .ok_or(TokenError::Malformed("truncated id"))?;
        let mut id = [0u8; TOKEN_ID_LENGTH];
        id.copy_from_slice(id_slice);
        let options = reader
            .read_u8()
            .ok_or(TokenError::Malformed("truncated options"))?;

        let issuer = ascii_field(
            reader
                .read_prefixed()
                .ok_or(TokenError::Malformed("issuer overruns buffer"))?,
            "non-ascii issuer",
        )?;
        let audience = ascii_field(
            reader
                .read_prefixed()
                .ok_or(TokenError::Malformed("audience overruns buffer"))?,
            "non-ascii audience",
        )?;
        let issued_time = ascii_field(
            reader
                .read_prefixed()
                .ok_or(TokenError::Malformed("issued time overruns buffer"))?,
            "non-ascii issued time",
        )?;
        let data = reader
            .read_prefixed()
            .ok_or(TokenError::Malformed("data overruns buffer"))?
            .to_vec();
        let binding = reader
            .read_prefixed()
            .ok_or(TokenError::Malformed("binding overruns buffer"))?
            .to_vec();
        let signature = reader.rest().to_vec();

        validate_origin(&issuer)?;
        validate_origin(&audience)?;

        Ok(Self {
            version,
            token_type,
            id,
            options,
            issuer,
            audience,
            issued_time,
            data,
            binding,
            signature,
        })
    }

    /// Verify the signature against a list of public keys.
    ///
    /// Keys are tried in order and the first match wins, so rotation lists
    /// with overlapping validity work. A signature that fails DER parsing is
    /// a non-match for that key, never a hard error.
    pub fn is_signature_valid(&self, keys: &[VerifyingKey]) -> bool {
        let Ok(signature) = Signature::from_der(&self.signature) else {
            return false;
        };
        let message = self.signing_input();
        keys.iter()
            .any(|key| key.verify(&message, &signature).is_ok())
    }

    /// The canonical signing input: every serialized byte before the
    /// signature.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            19 + 10
                + self.issuer.len()
                + self.audience.len()
                + self.issued_time.len()
                + self.data.len()
                + self.binding.len(),
        );
        buf.push(self.version);
        buf.push(self.token_type);
        buf.extend_from_slice(&self.id);
        buf.push(self.options);
        push_prefixed(&mut buf, self.issuer.as_bytes());
        push_prefixed(&mut buf, self.audience.as_bytes());
        push_prefixed(&mut buf, self.issued_time.as_bytes());
        push_prefixed(&mut buf, &self.data);
        push_prefixed(&mut buf, &self.binding);
        buf
    }

    /// The full serialized token: signing input followed by the signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.signing_input();
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// Single-line standard base64 of [`Self::to_bytes`].
    pub fn encode(&self) -> String {
        Base64::encode_string(&self.to_bytes())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn token_type(&self) -> u8 {
        self.token_type
    }

    pub fn id(&self) -> &[u8; TOKEN_ID_LENGTH] {
        &self.id
    }

    /// Token id as lower-case hex, the form used in records and callbacks.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    pub fn options(&self) -> u8 {
        self.options
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issued_time(&self) -> &str {
        &self.issued_time
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn binding(&self) -> &[u8] {
        &self.binding
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Generate a fresh 16-byte token id from the system entropy source.
pub fn new_token_id() -> Result<[u8; TOKEN_ID_LENGTH], TokenError> {
    let mut id = [0u8; TOKEN_ID_LENGTH];
    getrandom::getrandom(&mut id).map_err(|e| TokenError::RngFailed(e.to_string()))?;
    Ok(id)
}

/// Current UTC time as ISO-8601 with second precision and explicit offset,
/// e.g. `2017-01-31T15:04:05+00:00`.
pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn check_field_length(field: &'static str, len: usize) -> Result<(), TokenError> {
    if len > u16::MAX as usize {
        return Err(TokenError::FieldTooLong { field, len });
    }
    Ok(())
}

fn push_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    // Field lengths are checked against u16::MAX at construction.
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn ascii_field(bytes: &[u8], error: &'static str) -> Result<String, TokenError> {
    if !bytes.is_ascii() {
        return Err(TokenError::Malformed(error));
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| TokenError::Malformed(error))
}

/// Forward-only reader over the decoded token buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    /// Read a big-endian uint16 length followed by that many bytes.
    fn read_prefixed(&mut self) -> Option<&'a [u8]> {
        let len_bytes = self.read_bytes(2)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        self.read_bytes(len)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
