//! Client-side expiry check for access tokens.
//!
//! Only the payload's `exp` claim is read; the signature is the server's
//! business. Anything we cannot make sense of counts as expired.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// base64url that tolerates both padded and unpadded segments.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Returns true if `token` is absent, malformed, or expires at or before now.
pub fn is_token_expired(token: Option<&str>) -> bool {
    is_token_expired_at(token, Utc::now())
}

/// Same as [`is_token_expired`] against an explicit clock.
pub fn is_token_expired_at(token: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(token) = token else {
        return true;
    };
    match token_expiry(token) {
        Ok(exp) => now.timestamp_millis() as f64 >= exp * 1000.0,
        Err(e) => {
            debug!("Treating token as expired: {}", e);
            true
        }
    }
}

/// Reads the `exp` claim (seconds since epoch) from the token payload.
pub fn token_expiry(token: &str) -> Result<f64, String> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| "token has no payload segment".to_string())?;
    let raw = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| format!("payload is not base64url: {}", e))?;
    let claims: Value =
        serde_json::from_slice(&raw).map_err(|e| format!("payload is not JSON: {}", e))?;
    claims
        .get("exp")
        .and_then(Value::as_f64)
        .ok_or_else(|| "payload has no numeric exp claim".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Duration;
    use serde_json::json;

    fn token_with_payload(payload: &Value) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let now = Utc::now();
        let token = token_with_payload(&json!({ "exp": now.timestamp() - 1 }));
        assert!(is_token_expired_at(Some(&token), now));
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let now = Utc::now();
        let token = token_with_payload(&json!({ "exp": now.timestamp() + 3600 }));
        assert!(!is_token_expired_at(Some(&token), now));
        assert!(!is_token_expired(Some(&token)));
    }

    #[test]
    fn test_expiry_equal_to_now_is_expired() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = token_with_payload(&json!({ "exp": 1_700_000_000 }));
        assert!(is_token_expired_at(Some(&token), now));
        assert!(!is_token_expired_at(
            Some(&token),
            now - Duration::milliseconds(1)
        ));
    }

    #[test]
    fn test_fractional_expiry() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = token_with_payload(&json!({ "exp": 1_700_000_000.5 }));
        assert!(!is_token_expired_at(Some(&token), now));
    }

    #[test]
    fn test_absent_and_malformed_tokens_are_expired() {
        let now = Utc::now();
        let cases = [
            None,
            Some(""),
            Some("no-dots-at-all"),
            Some("header..signature"),
            Some("header.!!!not-base64!!!.signature"),
            Some("header.bm90IGpzb24.signature"), // "not json"
        ];
        for token in cases {
            assert!(is_token_expired_at(token, now), "expected expired: {:?}", token);
        }
    }

    #[test]
    fn test_missing_or_non_numeric_exp_is_expired() {
        let now = Utc::now();
        let no_exp = token_with_payload(&json!({ "sub": "alice" }));
        let string_exp = token_with_payload(&json!({ "exp": "tomorrow" }));
        assert!(is_token_expired_at(Some(&no_exp), now));
        assert!(is_token_expired_at(Some(&string_exp), now));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let now = Utc::now();
        let payload = json!({ "exp": now.timestamp() + 60 }).to_string();
        let padded = base64::engine::general_purpose::URL_SAFE.encode(payload);
        let token = format!("h.{}.s", padded);
        assert!(!is_token_expired_at(Some(&token), now));
    }
}
