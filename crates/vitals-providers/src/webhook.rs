//! Oura webhook notifications: signature verification and receipts.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use vitals_core::{
  event::{Provider, WebhookReceipt},
  idempotency::raw_event_id,
};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-oura-signature";

fn mac(secret: &str, body: &[u8]) -> Result<HmacSha256> {
  let mut mac =
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::InvalidSignature)?;
  mac.update(body);
  Ok(mac)
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
  Ok(hex::encode(mac(secret, body)?.finalize().into_bytes()))
}

/// Check `signature` (hex) against the body in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
  let expected = hex::decode(signature.trim()).map_err(|_| Error::InvalidSignature)?;
  mac(secret, body)?
    .verify_slice(&expected)
    .map_err(|_| Error::InvalidSignature)
}

#[derive(Debug, Deserialize)]
struct Notification {
  #[serde(default)]
  event_type:  Option<String>,
  #[serde(default)]
  data_type:   Option<String>,
  #[serde(default)]
  object_id:   Option<String>,
  #[serde(default)]
  user_id:     Option<String>,
}

/// Parse a verified body into a receipt. The id is
/// `oura_{object_id}_{event_type}`, or a hash of the body when either is
/// missing, so redeliveries collapse onto one receipt.
pub fn receipt_from_body(body: &[u8], received_at: DateTime<Utc>) -> Result<WebhookReceipt> {
  let value: Value = serde_json::from_slice(body).map_err(Error::MalformedWebhook)?;
  let note: Notification =
    serde_json::from_value(value.clone()).map_err(Error::MalformedWebhook)?;

  let native_id = match (&note.object_id, &note.event_type) {
    (Some(object), Some(event)) => Some(format!("{object}_{event}")),
    _ => None,
  };
  let provider = Provider::Oura;

  Ok(WebhookReceipt {
    id: raw_event_id(provider.as_ref(), native_id.as_deref(), &value),
    provider,
    provider_user_id: note.user_id,
    event_type: note.event_type,
    data_type: note.data_type,
    body: value,
    received_at,
  })
}
