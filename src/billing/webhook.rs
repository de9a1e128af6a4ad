/// Stripe webhook authentication
///
/// The `Stripe-Signature` header looks like `t=1492774577,v1=5257a8...,v1=...`.
/// Each `v1` is a hex HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint
/// secret. Any matching `v1` accepts the payload.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("malformed Stripe-Signature header")]
    MalformedHeader,

    #[error("webhook timestamp outside the tolerance window")]
    Expired,

    #[error("no signature matches the payload")]
    SignatureMismatch,

    #[error("invalid event payload: {0}")]
    Payload(String),
}

/// A Stripe event; `data.object` stays untyped because its shape depends on `type`
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// Check the signature header against the raw payload
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        match item.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    let signed_at: i64 = timestamp.parse().map_err(|_| WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    // The header is untrusted; an age that does not fit in an i64 is simply too old.
    match now.checked_sub(signed_at) {
        Some(age) if age <= SIGNATURE_TOLERANCE_SECS => {}
        _ => return Err(WebhookError::Expired),
    }

    let mac = signed_mac(payload, timestamp, secret)?;
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Verify and parse a webhook request body
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<Event, WebhookError> {
    verify_signature(payload, header, secret, now)?;
    serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
}

fn signed_mac(payload: &[u8], timestamp: &str, secret: &str) -> Result<HmacSha256, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{"id":"in_1"}}}"#;

    fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
        let timestamp = timestamp.to_string();
        let mac = signed_mac(payload, &timestamp, secret)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let header = sign_payload(PAYLOAD, SECRET, 1_700_000_000).unwrap();
        let event = construct_event(PAYLOAD, &header, SECRET, 1_700_000_010).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, "invoice.paid");
        assert_eq!(event.data.object["id"], "in_1");
    }

    #[test]
    fn any_matching_v1_is_enough() {
        let signed = sign_payload(PAYLOAD, SECRET, 1_700_000_000).unwrap();
        let good = signed.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), good);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let header = sign_payload(PAYLOAD, SECRET, 1_700_000_000).unwrap();
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, 1_700_000_000),
            Err(WebhookError::SignatureMismatch)
        );
        assert_eq!(
            verify_signature(PAYLOAD, &header, "whsec_other", 1_700_000_000),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamps() {
        let header = sign_payload(PAYLOAD, SECRET, 1_700_000_000).unwrap();
        let now = 1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1;
        assert_eq!(verify_signature(PAYLOAD, &header, SECRET, now), Err(WebhookError::Expired));
    }

    #[test]
    fn rejects_malformed_headers() {
        let headers = [
            "",
            "v1=abcd",
            "t=notanumber,v1=abcd",
            "t=1700000000",
            "t=99999999999999999999,v1=00",
        ];
        for header in headers {
            assert_eq!(
                verify_signature(PAYLOAD, header, SECRET, 1_700_000_000),
                Err(WebhookError::MalformedHeader),
                "header: {header:?}"
            );
        }
    }

    #[test]
    fn extreme_timestamps_are_expired_without_overflow() {
        let header = format!("t={},v1=00", i64::MIN);
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, 1_700_000_000),
            Err(WebhookError::Expired)
        );
        assert_eq!(
            verify_signature(b"{}", "t=-9223372036854775808,v1=00", SECRET, i64::MAX),
            Err(WebhookError::Expired)
        );
    }
}
