//! Failures: the audit trail of rejected or dropped writes.
//!
//! Append-only and read-only to clients. A failure explains why a raw event
//! produced no canonical event; it is never used to drive retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::idempotency::stable_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
  /// The mapper rejected the raw event.
  RawEventInvalid,
  /// An idempotency key was reused for different content; the second write
  /// was dropped.
  DuplicateEvent,
}

/// Why the mapper refused a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
  UnsupportedProvider,
  UnsupportedKind,
  MalformedPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
  pub id:           String,
  pub user_id:      String,
  pub kind:         FailureKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw_event_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason:       Option<RejectionReason>,
  pub message:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details:      Option<Value>,
  pub created_at:   DateTime<Utc>,
}

impl Failure {
  /// Deterministic failure id, so reprocessing the same input cannot append a
  /// second copy of the same failure.
  pub fn id_for(kind: FailureKind, raw_event_id: &str, discriminator: &str) -> String {
    let kind = match kind {
      FailureKind::RawEventInvalid => "raw_event_invalid",
      FailureKind::DuplicateEvent => "duplicate_event",
    };
    let digest = stable_hash(format!("{kind}\n{raw_event_id}\n{discriminator}").as_bytes());
    format!("{kind}_{digest}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failure_ids_are_deterministic_and_kind_scoped() {
    let a = Failure::id_for(FailureKind::RawEventInvalid, "manual_x", "");
    let b = Failure::id_for(FailureKind::RawEventInvalid, "manual_x", "");
    let c = Failure::id_for(FailureKind::DuplicateEvent, "manual_x", "");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("raw_event_invalid_"));
  }

  #[test]
  fn kinds_serialise_screaming() {
    assert_eq!(
      serde_json::to_string(&FailureKind::RawEventInvalid).unwrap(),
      "\"RAW_EVENT_INVALID\""
    );
    assert_eq!(
      serde_json::to_string(&RejectionReason::MalformedPayload).unwrap(),
      "\"MALFORMED_PAYLOAD\""
    );
  }
}
