//! # Stripe Webhook Handling
//!
//! Signature verification for Stripe webhooks and extraction of completed
//! checkouts, so a purchase can be fulfilled without the buyer returning to
//! the success page.

use crate::session::StripeSession;
use chrono::Utc;
use drop_core::{DropError, DropResult, PurchaseConfirmation};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type that triggers fulfillment
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// A verified webhook, reduced to what the engine acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted(PurchaseConfirmation),
    /// Any other event type; acknowledged and ignored
    Ignored(String),
}

/// Verifies `Stripe-Signature` headers against the endpoint's signing secret
#[derive(Clone)]
pub struct StripeWebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Verify and parse a webhook payload
    pub fn verify(&self, payload: &[u8], signature: &str) -> DropResult<WebhookEvent> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }

    /// Verify against an explicit clock, in unix seconds
    #[instrument(skip(self, payload, signature))]
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: &str,
        now_secs: i64,
    ) -> DropResult<WebhookEvent> {
        let sig_parts = parse_signature_header(signature)?;

        let timestamp = sig_parts.timestamp;
        if now_secs.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(DropError::WebhookVerificationFailed(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        let mac = signed_payload_mac(&self.secret, timestamp, payload);

        let valid = sig_parts.signatures.iter().any(|sig| {
            hex::decode(sig)
                .map(|tag| mac.clone().verify_slice(&tag).is_ok())
                .unwrap_or(false)
        });

        if !valid {
            return Err(DropError::WebhookVerificationFailed(
                "Signature mismatch".to_string(),
            ));
        }

        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            DropError::WebhookParseError(format!("Failed to parse webhook: {}", e))
        })?;

        debug!("Verified Stripe webhook: id={}, type={}", event.id, event.event_type);

        if event.event_type != CHECKOUT_COMPLETED {
            return Ok(WebhookEvent::Ignored(event.event_type));
        }

        let session: StripeSession = serde_json::from_value(event.data.object).map_err(|e| {
            DropError::WebhookParseError(format!("Invalid checkout session object: {}", e))
        })?;

        Ok(WebhookEvent::CheckoutCompleted(session.into_confirmation()))
    }
}

impl std::fmt::Debug for StripeWebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeWebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

// =============================================================================
// Signature Header
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> DropResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        DropError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(DropError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// MAC over `{timestamp}.{payload}`, fed the raw payload bytes
fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;

    fn signed(payload: &str, timestamp: i64) -> String {
        signed_bytes(payload.as_bytes(), timestamp)
    }

    fn signed_bytes(payload: &[u8], timestamp: i64) -> String {
        let tag = signed_payload_mac(SECRET, timestamp, payload).finalize().into_bytes();
        format!("t={},v1={}", timestamp, hex::encode(tag))
    }

    fn completed_payload() -> String {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": NOW,
            "data": { "object": {
                "id": "cs_test_abc12345",
                "payment_status": "paid",
                "amount_total": 1500,
                "currency": "usd",
                "customer_details": { "email": "buyer@example.com" },
                "metadata": { "items": "[\"price_voice\"]" }
            }}
        })
        .to_string()
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v1=def456,v0=old").unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_parse_signature_header_rejects_incomplete() {
        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
        assert!(parse_signature_header("").is_err());
    }

    #[test]
    fn test_signature_matches_stripe_scheme() {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(b"1234567890.{}");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(signed("{}", 1234567890), format!("t=1234567890,v1={expected}"));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let verifier = StripeWebhookVerifier::new(SECRET);

        for header in [
            "t=-9223372036854775808,v1=aa",
            "t=9223372036854775807,v1=aa",
        ] {
            let err = verifier.verify_at(b"{}", header, NOW).unwrap_err();
            assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
        }

        let err = verifier
            .verify_at(b"{}", &signed("{}", i64::MIN), i64::MAX)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_non_utf8_payload_is_signed_as_raw_bytes() {
        let payload: &[u8] = b"{\"id\":\"evt_\xff\"}";
        let verifier = StripeWebhookVerifier::new(SECRET);

        // Signature over the raw bytes passes, so the failure is the JSON parse
        let err = verifier
            .verify_at(payload, &signed_bytes(payload, NOW), NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookParseError(_)));

        // Signature over the lossy UTF-8 rendering must not verify
        let lossy = String::from_utf8_lossy(payload).into_owned();
        let err = verifier
            .verify_at(payload, &signed(&lossy, NOW), NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_non_hex_signature_is_rejected() {
        let payload = completed_payload();
        let err = StripeWebhookVerifier::new(SECRET)
            .verify_at(payload.as_bytes(), &format!("t={NOW},v1=zz-not-hex"), NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_checkout_completed() {
        let payload = completed_payload();
        let verifier = StripeWebhookVerifier::new(SECRET);

        let event = verifier
            .verify_at(payload.as_bytes(), &signed(&payload, NOW), NOW + 10)
            .unwrap();

        match event {
            WebhookEvent::CheckoutCompleted(confirmation) => {
                assert_eq!(confirmation.session_id, "cs_test_abc12345");
                assert!(confirmation.is_paid());
                assert_eq!(confirmation.items, vec!["price_voice".to_string()]);
                assert_eq!(confirmation.customer_email.as_deref(), Some("buyer@example.com"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_other_events_are_ignored() {
        let payload = json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1" } }
        })
        .to_string();
        let verifier = StripeWebhookVerifier::new(SECRET);

        let event = verifier
            .verify_at(payload.as_bytes(), &signed(&payload, NOW), NOW)
            .unwrap();
        assert_eq!(event, WebhookEvent::Ignored("charge.refunded".to_string()));
    }

    #[test]
    fn test_tampered_payload() {
        let payload = completed_payload();
        let header = signed(&payload, NOW);
        let tampered = payload.replace("1500", "1");

        let err = StripeWebhookVerifier::new(SECRET)
            .verify_at(tampered.as_bytes(), &header, NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_wrong_secret() {
        let payload = completed_payload();
        let err = StripeWebhookVerifier::new("whsec_other")
            .verify_at(payload.as_bytes(), &signed(&payload, NOW), NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_stale_timestamp() {
        let payload = completed_payload();
        let verifier = StripeWebhookVerifier::new(SECRET);
        let header = signed(&payload, NOW);

        assert!(verifier
            .verify_at(payload.as_bytes(), &header, NOW + SIGNATURE_TOLERANCE_SECS)
            .is_ok());
        assert!(verifier
            .verify_at(payload.as_bytes(), &header, NOW + SIGNATURE_TOLERANCE_SECS + 1)
            .is_err());
    }

    #[test]
    fn test_signed_garbage_is_parse_error() {
        let payload = "not json";
        let err = StripeWebhookVerifier::new(SECRET)
            .verify_at(payload.as_bytes(), &signed(payload, NOW), NOW)
            .unwrap_err();
        assert!(matches!(err, DropError::WebhookParseError(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", StripeWebhookVerifier::new(SECRET));
        assert!(!rendered.contains("whsec_test"));
    }
}
