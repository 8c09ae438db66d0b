//! Property tests over the token codec, signer, origin validator, and
//! replay guard.

use base64ct::{Base64, Encoding};
use proptest::prelude::*;
use recovery_core::{
    generate_signing_key, validate_origin, MemoryReplayGuard, RecoveryToken, ReplayGuard,
    TokenError,
};

fn arb_origin() -> impl Strategy<Value = String> {
    (
        "[a-z0-9-]{1,12}",
        "[a-z0-9-]{1,12}",
        "[a-z]{2,8}",
        proptest::option::of(0u16..=9999),
    )
        .prop_map(|(sub, host, tld, port)| match port {
            Some(port) => format!("https://{sub}.{host}.{tld}:{port}"),
            None => format!("https://{sub}.{host}.{tld}"),
        })
}

fn arb_token_fields() -> impl Strategy<Value = ([u8; 16], u8, Vec<u8>, Vec<u8>)> {
    (
        any::<[u8; 16]>(),
        0u8..=3,
        proptest::collection::vec(any::<u8>(), 0..256),
        proptest::collection::vec(any::<u8>(), 0..64),
    )
}

proptest! {
    /// Serialize/deserialize is the identity on valid tokens, byte for byte.
    #[test]
    fn round_trip((id, options, data, binding) in arb_token_fields(),
                  issuer in arb_origin(),
                  audience in arb_origin()) {
        let key = generate_signing_key();
        let token =
            RecoveryToken::new(&key, &id, options, &issuer, &audience, &data, &binding).unwrap();
        let parsed = RecoveryToken::parse(&token.encode()).unwrap();
        prop_assert_eq!(&parsed, &token);
        prop_assert_eq!(parsed.to_bytes(), token.to_bytes());
    }

    /// A freshly signed token always verifies under its own public key.
    #[test]
    fn sign_then_verify((id, options, data, binding) in arb_token_fields()) {
        let key = generate_signing_key();
        let token = RecoveryToken::new(
            &key,
            &id,
            options,
            "https://ap.example",
            "https://rp.example",
            &data,
            &binding,
        )
        .unwrap();
        prop_assert!(token.is_signature_valid(&[*key.verifying_key()]));
    }

    /// Flipping any bit of the canonical signing input invalidates the
    /// signature.
    #[test]
    fn tamper_detection((id, options, data, binding) in arb_token_fields(),
                        flip_byte in any::<proptest::sample::Index>(),
                        flip_bit in 0u8..8) {
        let key = generate_signing_key();
        let token = RecoveryToken::new(
            &key,
            &id,
            options,
            "https://ap.example",
            "https://rp.example",
            &data,
            &binding,
        )
        .unwrap();
        let mut bytes = token.to_bytes();
        let signed_len = bytes.len() - token.signature().len();
        let target = flip_byte.index(signed_len);
        bytes[target] ^= 1 << flip_bit;

        // The flip may break structure entirely; if it still parses, the
        // signature must no longer verify.
        if let Ok(tampered) = RecoveryToken::parse(&Base64::encode_string(&bytes)) {
            prop_assert!(!tampered.is_signature_valid(&[*key.verifying_key()]));
        }
    }

    /// A token verifies iff the signer's public key is in the provided list.
    #[test]
    fn multi_key_acceptance(decoys in 0usize..4) {
        let signer = generate_signing_key();
        let others: Vec<_> = (0..decoys).map(|_| generate_signing_key()).collect();
        let token = RecoveryToken::new(
            &signer,
            &[7u8; 16],
            0,
            "https://ap.example",
            "https://rp.example",
            b"",
            b"",
        )
        .unwrap();

        let mut with_signer: Vec<_> = others.iter().map(|k| *k.verifying_key()).collect();
        with_signer.push(*signer.verifying_key());
        prop_assert!(token.is_signature_valid(&with_signer));

        let without_signer: Vec<_> = others.iter().map(|k| *k.verifying_key()).collect();
        prop_assert!(!token.is_signature_valid(&without_signer));
    }

    /// A valid origin stays valid; appending a slash never does.
    #[test]
    fn origin_idempotence(origin in arb_origin()) {
        prop_assert!(validate_origin(&origin).is_ok());
        prop_assert!(validate_origin(&origin).is_ok());
        let with_trailing_slash = format!("{}/", origin);
        prop_assert!(validate_origin(&with_trailing_slash).is_err());
    }

    /// Inflating a declared length beyond the buffer is always rejected as
    /// malformed, for every length field.
    #[test]
    fn length_field_totality((id, options, data, binding) in arb_token_fields(),
                             which in 0usize..5) {
        let key = generate_signing_key();
        let token = RecoveryToken::new(
            &key,
            &id,
            options,
            "https://ap.example",
            "https://rp.example",
            &data,
            &binding,
        )
        .unwrap();
        let mut bytes = token.to_bytes();

        // Walk to the selected length prefix and overstate it.
        let mut offset = 19;
        for _ in 0..which {
            let len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
            offset += 2 + len;
        }
        bytes[offset] = 0xff;
        bytes[offset + 1] = 0xff;
        // 65535 always overruns: the whole buffer is far smaller.
        prop_assume!(bytes.len() < 0xffff);

        let err = RecoveryToken::parse(&Base64::encode_string(&bytes)).unwrap_err();
        prop_assert!(matches!(err, TokenError::Malformed(_)));
    }

    /// Recording is idempotent and membership is stable.
    #[test]
    fn replay_idempotence(tokens in proptest::collection::vec("[A-Za-z0-9+/=]{8,64}", 1..16)) {
        let guard = MemoryReplayGuard::new();
        for token in &tokens {
            guard.record(token);
            prop_assert!(guard.seen(token));
            // A second record is a no-op and membership is unchanged.
            prop_assert!(!guard.record(token));
            prop_assert!(guard.seen(token));
        }
    }
}
