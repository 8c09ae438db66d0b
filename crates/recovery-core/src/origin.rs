//! RFC 6454 origin validation, restricted to `https://host[:port]`.

use crate::error::TokenError;

/// Validate that a string is an ASCII `https://` origin with no path.
///
/// The accepted grammar is `https://` followed by one or more lower-case DNS
/// labels of 1..=63 characters from `[a-z0-9-]` separated by `.`, a TLD of
/// 2..=63 letters, and an optional `:port` of decimal digits. Anything else
/// (uppercase, trailing slash, query, fragment, IP-style hosts) is rejected.
///
/// The protocol identifies principals by origin; two spellings of the same
/// principal must never compare unequal, so the grammar is deliberately
/// narrower than what a browser would accept.
pub fn validate_origin(origin: &str) -> Result<(), TokenError> {
    parse_origin(origin).ok_or_else(|| TokenError::InvalidOrigin(origin.to_string()))
}

fn parse_origin(origin: &str) -> Option<()> {
    let rest = origin.strip_prefix("https://")?;

    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let mut labels = host.split('.');
    let tld = labels.next_back()?;
    if !(2..=63).contains(&tld.len()) || !tld.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }

    // At least one label must precede the TLD.
    let mut count = 0;
    for label in labels {
        count += 1;
        if label.is_empty()
            || label.len() > 63
            || !label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return None;
        }
    }
    if count == 0 {
        return None;
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_origin() {
        assert!(validate_origin("https://example.com").is_ok());
    }

    #[test]
    fn accepts_subdomains() {
        assert!(validate_origin("https://www.recovery.example.com").is_ok());
    }

    #[test]
    fn accepts_port() {
        assert!(validate_origin("https://example.com:8443").is_ok());
    }

    #[test]
    fn accepts_digits_and_hyphens_in_labels() {
        assert!(validate_origin("https://my-app-01.example.org").is_ok());
    }

    #[test]
    fn rejects_http_scheme() {
        assert!(validate_origin("http://example.com").is_err());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(validate_origin("example.com").is_err());
    }

    #[test]
    fn rejects_trailing_slash() {
        assert!(validate_origin("https://example.com/").is_err());
    }

    #[test]
    fn rejects_path_query_fragment() {
        assert!(validate_origin("https://example.com/login").is_err());
        assert!(validate_origin("https://example.com?x=1").is_err());
        assert!(validate_origin("https://example.com#top").is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(validate_origin("https://Example.com").is_err());
        assert!(validate_origin("https://example.COM").is_err());
    }

    #[test]
    fn rejects_bare_tld() {
        assert!(validate_origin("https://com").is_err());
    }

    #[test]
    fn rejects_numeric_tld() {
        assert!(validate_origin("https://127.0.0.1").is_err());
    }

    #[test]
    fn rejects_empty_label() {
        assert!(validate_origin("https://.example.com").is_err());
        assert!(validate_origin("https://example..com").is_err());
        assert!(validate_origin("https://example.com.").is_err());
    }

    #[test]
    fn rejects_single_letter_tld() {
        assert!(validate_origin("https://example.c").is_err());
    }

    #[test]
    fn rejects_empty_and_non_numeric_port() {
        assert!(validate_origin("https://example.com:").is_err());
        assert!(validate_origin("https://example.com:8a43").is_err());
    }

    #[test]
    fn rejects_overlong_label() {
        let long = "a".repeat(64);
        assert!(validate_origin(&format!("https://{long}.example.com")).is_err());
        let max = "a".repeat(63);
        assert!(validate_origin(&format!("https://{max}.example.com")).is_ok());
    }

    #[test]
    fn error_carries_the_offending_string() {
        let err = validate_origin("https://bad origin").unwrap_err();
        assert!(err.to_string().contains("bad origin"));
    }
}
