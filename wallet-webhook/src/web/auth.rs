//! Shared-token check for inbound deliveries.
//!
//! The wallet service echoes back the token header and value it was given at
//! subscription time. When no header is configured every delivery is accepted.

use axum::http::HeaderMap;
use tracing::warn;

use crate::config::Options;

/// Check the delivery token carried in `headers` against the configured one.
///
/// A missing or non-UTF-8 header counts as a mismatch.
pub fn verify_token(headers: &HeaderMap, options: &Options) -> bool {
    if !options.auth_enabled() {
        return true;
    }

    let provided = match headers
        .get(options.token_header.as_str())
        .and_then(|v| v.to_str().ok())
    {
        Some(v) => v,
        None => {
            warn!(header = %options.token_header, "webhook_token_missing");
            return false;
        }
    };

    let valid = constant_time_compare(provided, &options.token_value);
    if !valid {
        warn!(header = %options.token_header, "webhook_token_mismatch");
    }
    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_no_header_configured_accepts_anything() {
        let options = Options::new();
        assert!(verify_token(&HeaderMap::new(), &options));
        assert!(verify_token(&headers("x-wallet-token", "whatever"), &options));
    }

    #[test]
    fn test_matching_token() {
        let options = Options::new().with_token("X-Wallet-Token", "s3cret");
        assert!(verify_token(&headers("x-wallet-token", "s3cret"), &options));
    }

    #[test]
    fn test_mismatched_token() {
        let options = Options::new().with_token("X-Wallet-Token", "s3cret");
        assert!(!verify_token(&headers("x-wallet-token", "guess"), &options));
        assert!(!verify_token(&headers("x-other", "s3cret"), &options));
        assert!(!verify_token(&HeaderMap::new(), &options));
    }

    #[test]
    fn test_empty_expected_value_requires_empty_header() {
        let options = Options::new().with_token("X-Wallet-Token", "");
        assert!(verify_token(&headers("x-wallet-token", ""), &options));
        assert!(!verify_token(&HeaderMap::new(), &options));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
