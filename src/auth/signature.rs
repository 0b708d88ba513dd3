use anyhow::Context;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::errors::{GatewayError, GatewayResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Enforcement strictness for webhook signatures, decided at construction
/// from the deployment environment and injected — never read from ambient
/// process state, so tests can exercise both policies deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Missing signatures pass (logged as skipped). Development default.
    Optional,
    /// Missing signatures are rejected. Production default.
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    Verified,
    Skipped,
}

/// Verifies HMAC-SHA256 signatures over the canonical serialization of a
/// webhook body.
///
/// The canonical form is pinned as part of the wire contract: compact UTF-8
/// JSON of the parsed body (`serde_json::to_vec`, object keys in map order).
/// Signers must produce the same bytes; signing raw pre-parse bytes is not
/// supported.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: String,
    policy: SignaturePolicy,
}

/// The exact byte sequence that gets signed.
pub fn canonical_body(body: &serde_json::Value) -> Vec<u8> {
    // serde_json compact encoding; infallible for Value without non-string keys.
    serde_json::to_vec(body).unwrap_or_default()
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, policy: SignaturePolicy) -> Self {
        Self {
            secret: secret.into(),
            policy,
        }
    }

    pub fn policy(&self) -> SignaturePolicy {
        self.policy
    }

    /// Hex HMAC-SHA256 over the canonical body. Used by the signing side and
    /// by test fixtures.
    pub fn sign(&self, body: &serde_json::Value) -> GatewayResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("HMAC key setup failed")?;
        mac.update(&canonical_body(body));
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a signature header against the body. See the decision table in
    /// the crate docs: a missing header passes only under the Optional
    /// policy; a present header must match byte-for-byte in constant time.
    pub fn verify(
        &self,
        header: Option<&str>,
        body: &serde_json::Value,
    ) -> GatewayResult<SignatureOutcome> {
        let Some(header) = header else {
            return match self.policy {
                SignaturePolicy::Optional => {
                    debug!("webhook signature absent; verification skipped");
                    Ok(SignatureOutcome::Skipped)
                }
                SignaturePolicy::Required => Err(GatewayError::Unauthenticated(
                    format!("missing {} header", SIGNATURE_HEADER),
                )),
            };
        };

        // Tolerate the GitHub-style "sha256=" prefix.
        let header = header.strip_prefix("sha256=").unwrap_or(header);
        let Ok(provided) = hex::decode(header) else {
            return Err(GatewayError::Forbidden("malformed webhook signature".into()));
        };

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("HMAC key setup failed")?;
        mac.update(&canonical_body(body));
        let expected = mac.finalize().into_bytes();

        // ct_eq is false for length mismatches without short-circuiting.
        if bool::from(expected.as_slice().ct_eq(&provided)) {
            Ok(SignatureOutcome::Verified)
        } else {
            Err(GatewayError::Forbidden("invalid webhook signature".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Pinned wire-contract fixture: HMAC-SHA256 of `{"a":1}` under key "k".
    const FIXTURE_DIGEST: &str = "c3a92ff9e274cdcce27a58c15a78ec6dcbbdbd0038a87e7a11baef2028fd8bff";

    fn verifier(policy: SignaturePolicy) -> SignatureVerifier {
        SignatureVerifier::new("k", policy)
    }

    #[test]
    fn canonical_form_is_compact_json() {
        assert_eq!(canonical_body(&json!({"a": 1})), b"{\"a\":1}");
    }

    #[test]
    fn sign_matches_pinned_fixture() {
        let sig = verifier(SignaturePolicy::Required)
            .sign(&json!({"a": 1}))
            .unwrap();
        assert_eq!(sig, FIXTURE_DIGEST);
    }

    #[test]
    fn round_trip_accepts() {
        let v = verifier(SignaturePolicy::Required);
        let body = json!({"userId": 1, "text": "hello"});
        let sig = v.sign(&body).unwrap();
        assert_eq!(
            v.verify(Some(&sig), &body).unwrap(),
            SignatureOutcome::Verified
        );
    }

    #[test]
    fn other_secret_rejects() {
        let body = json!({"a": 1});
        let sig = verifier(SignaturePolicy::Required).sign(&body).unwrap();
        let other = SignatureVerifier::new("not-k", SignaturePolicy::Required);
        assert!(matches!(
            other.verify(Some(&sig), &body),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn sha256_prefix_tolerated() {
        let v = verifier(SignaturePolicy::Required);
        let body = json!({"a": 1});
        let sig = format!("sha256={}", v.sign(&body).unwrap());
        assert_eq!(
            v.verify(Some(&sig), &body).unwrap(),
            SignatureOutcome::Verified
        );
    }

    #[test]
    fn equal_length_but_different_bytes_rejects() {
        let v = verifier(SignaturePolicy::Required);
        // Same length as the real digest, last hex digit flipped.
        let mut forged = FIXTURE_DIGEST.to_string();
        forged.pop();
        forged.push('e');
        assert!(matches!(
            v.verify(Some(&forged), &json!({"a": 1})),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn differing_length_rejects() {
        let v = verifier(SignaturePolicy::Required);
        assert!(matches!(
            v.verify(Some("c3a92f"), &json!({"a": 1})),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn non_hex_signature_rejects() {
        let v = verifier(SignaturePolicy::Required);
        assert!(matches!(
            v.verify(Some("not hex at all"), &json!({"a": 1})),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn missing_header_passes_under_optional_policy() {
        let v = verifier(SignaturePolicy::Optional);
        assert_eq!(
            v.verify(None, &json!({"a": 1})).unwrap(),
            SignatureOutcome::Skipped
        );
    }

    #[test]
    fn missing_header_rejected_under_required_policy() {
        let v = verifier(SignaturePolicy::Required);
        assert!(matches!(
            v.verify(None, &json!({"a": 1})),
            Err(GatewayError::Unauthenticated(_))
        ));
    }

    #[test]
    fn present_signature_checked_even_under_optional_policy() {
        let v = verifier(SignaturePolicy::Optional);
        assert!(matches!(
            v.verify(Some("deadbeef"), &json!({"a": 1})),
            Err(GatewayError::Forbidden(_))
        ));
    }
}
