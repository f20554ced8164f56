//! Payment-processor webhook: signature verification and ledger credit.
//!
//! The processor signs each delivery with a `Stripe-Signature` header:
//!
//! ```text
//! t=1700000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! where `v1` is the hex HMAC-SHA256 of `"{t}.{raw body}"` under the webhook
//! secret. Several `v1` entries may be present (secret rotation); any match
//! is accepted. Deliveries older or newer than the tolerance are rejected.
//!
//! Only `checkout.session.completed` changes state: it credits
//! `metadata.credits` to `metadata.user_id`, referenced by the session id, at
//! most once. Every other event type is acknowledged and ignored.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::credits::{self, LedgerEntry, LedgerError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("timestamp outside the tolerance zone")]
    Expired,
    #[error("no signatures found matching the expected signature for payload")]
    Mismatch,
}

fn signature_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Build a signature header for `payload`, as the processor would.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mac = signature_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a `Stripe-Signature` header against the raw request body.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let expected = signature_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// A webhook event, reduced to the fields this service reads.
#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

impl Event {
    pub fn parse(payload: &[u8]) -> Result<Event, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// What a webhook delivery did.
#[derive(Debug)]
pub enum WebhookOutcome {
    Credited(LedgerEntry),
    /// The session was already credited.
    Duplicate,
    /// Acknowledged without changing anything.
    Ignored(String),
}

/// Extract `(session id, user id, credits)` from a completed checkout session.
fn completed_session(object: &Value) -> Option<(&str, &str, i64)> {
    let session_id = object.get("id")?.as_str()?;
    let metadata = object.get("metadata")?;
    let user_id = metadata.get("user_id")?.as_str().filter(|u| !u.is_empty())?;
    let credits = match metadata.get("credits")? {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    (credits > 0).then_some((session_id, user_id, credits))
}

/// Apply a verified event to the ledger.
pub async fn apply_event(pool: &SqlitePool, event: &Event) -> Result<WebhookOutcome, LedgerError> {
    if event.kind != "checkout.session.completed" {
        tracing::debug!(event_id = %event.id, kind = %event.kind, "ignoring webhook event");
        return Ok(WebhookOutcome::Ignored(event.kind.clone()));
    }

    let Some((session_id, user_id, amount)) = completed_session(&event.data.object) else {
        tracing::warn!(event_id = %event.id, "checkout session without user_id/credits metadata");
        return Ok(WebhookOutcome::Ignored(event.kind.clone()));
    };

    match credits::record_purchase(pool, user_id, amount, session_id).await? {
        Some(entry) => {
            tracing::info!(user_id, credits = amount, session_id, "purchase credited");
            Ok(WebhookOutcome::Credited(entry))
        }
        None => {
            tracing::info!(session_id, "purchase already credited");
            Ok(WebhookOutcome::Duplicate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, 1_000, body).unwrap();
        assert_eq!(verify_signature(SECRET, &header, body, 1_100, 300), Ok(()));
    }

    #[test]
    fn test_signature_rejections() {
        let body = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, 1_000, body).unwrap();

        assert_eq!(
            verify_signature(SECRET, &header, b"{}", 1_000, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("other", &header, body, 1_000, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(SECRET, &header, body, 2_000, 300),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(SECRET, "v1=abc", body, 1_000, 300),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_rotated_secret_any_v1_matches() {
        let body = b"payload";
        let good = signature_header(SECRET, 1_000, body).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t=1000,v1={},v1={}", "00".repeat(32), good_sig);
        assert_eq!(verify_signature(SECRET, &header, body, 1_000, 300), Ok(()));
    }

    #[test]
    fn test_event_parse() {
        let event = Event::parse(
            br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "invoice.paid");
        assert!(Event::parse(b"not json").is_err());
    }

    #[test]
    fn test_completed_session_metadata() {
        let object = json!({
            "id": "cs_1",
            "metadata": {"user_id": "u1", "credits": "10"}
        });
        assert_eq!(completed_session(&object), Some(("cs_1", "u1", 10)));

        let zero = json!({"id": "cs_2", "metadata": {"user_id": "u1", "credits": "0"}});
        assert_eq!(completed_session(&zero), None);

        let anonymous = json!({"id": "cs_3", "metadata": {"credits": "5"}});
        assert_eq!(completed_session(&anonymous), None);
    }
}
