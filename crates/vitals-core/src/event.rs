//! Raw events: the immutable, append-only record of everything ingested.
//!
//! A raw event is never updated or deleted. A correction is a new raw event
//! whose `correction_of_raw_event_id` points back at the original.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
  SCHEMA_VERSION,
  idempotency::{canonical_json, raw_event_id, stable_hash},
};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

/// The domain-specific tag of an event.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  Sleep,
  Steps,
  Workout,
  Weight,
  Hrv,
  Nutrition,
  StrengthWorkout,
}

/// A source of events the pipeline knows how to map.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Provider {
  Manual,
  Withings,
  Oura,
}

impl Provider {
  /// Event kinds this provider is able to emit.
  pub fn supported_kinds(self) -> &'static [EventKind] {
    match self {
      Self::Manual => &[
        EventKind::Sleep,
        EventKind::Steps,
        EventKind::Workout,
        EventKind::Weight,
        EventKind::Hrv,
        EventKind::Nutrition,
        EventKind::StrengthWorkout,
      ],
      Self::Withings => &[EventKind::Weight, EventKind::Sleep, EventKind::Steps],
      Self::Oura => &[
        EventKind::Sleep,
        EventKind::Steps,
        EventKind::Workout,
        EventKind::Hrv,
      ],
    }
  }

  pub fn supports(self, kind: EventKind) -> bool {
    self.supported_kinds().contains(&kind)
  }
}

/// Why this raw event exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
  Manual,
  Backfill,
  Correction,
  Device,
}

/// How trustworthy the measured value is, as declared by the producer.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyState {
  #[default]
  Measured,
  Estimated,
  Unknown,
}

impl UncertaintyState {
  /// Contribution of one event to its domain's confidence score.
  pub fn weight(self) -> f64 {
    match self {
      Self::Measured => 1.0,
      Self::Estimated => 0.6,
      Self::Unknown => 0.3,
    }
  }
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// When the event happened: a single instant or a closed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OccurredAt {
  Instant(DateTime<Utc>),
  Range {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },
}

impl OccurredAt {
  pub fn start(&self) -> DateTime<Utc> {
    match self {
      Self::Instant(at) => *at,
      Self::Range { start, .. } => *start,
    }
  }

  pub fn end(&self) -> DateTime<Utc> {
    match self {
      Self::Instant(at) => *at,
      Self::Range { end, .. } => *end,
    }
  }
}

// ─── RawEvent ────────────────────────────────────────────────────────────────

/// An ingested event before validation or normalisation. Once written, no
/// field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
  /// Idempotency key; see [`crate::idempotency`].
  pub id:                         String,
  pub user_id:                    String,
  /// Provider identity, e.g. `"manual"`, `"withings"`, `"oura"`. Kept open so
  /// unknown sources can be rejected with provenance instead of lost.
  pub source_id:                  String,
  /// Event kind tag; kept open for the same reason as `source_id`.
  pub kind:                       String,
  /// Opaque per-kind structure, validated only by the mapper.
  pub payload:                    Value,
  pub observed_at:                OccurredAt,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time_zone:                  Option<String>,
  pub received_at:                DateTime<Utc>,
  pub schema_version:             u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provenance:                 Option<Provenance>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correction_of_raw_event_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uncertainty_state:          Option<UncertaintyState>,
  /// Hash of the event content; distinguishes a retried delivery from a
  /// different event that reuses the same key.
  pub fingerprint:                String,
}

// ─── Ingestion envelope ──────────────────────────────────────────────────────

/// The shape accepted at the ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEnvelope {
  pub provider:                   String,
  pub kind:                       String,
  pub occurred_at:                OccurredAt,
  #[serde(default)]
  pub time_zone:                  Option<String>,
  pub payload:                    Value,
  #[serde(default)]
  pub provenance:                 Option<Provenance>,
  #[serde(default)]
  pub correction_of_raw_event_id: Option<String>,
  #[serde(default)]
  pub uncertainty_state:          Option<UncertaintyState>,
  /// Producer-supplied idempotency key; honoured verbatim when present.
  #[serde(default)]
  pub idempotency_key:            Option<String>,
  #[serde(default)]
  pub schema_version:             Option<u32>,
}

impl IngestEnvelope {
  /// The content that identifies this event, independent of delivery
  /// metadata such as the idempotency key.
  fn identity(&self) -> Value {
    json!({
      "provider":   self.provider,
      "kind":       self.kind,
      "occurredAt": self.occurred_at,
      "timeZone":   self.time_zone,
      "payload":    self.payload,
    })
  }

  /// Stable content hash of the envelope.
  pub fn fingerprint(&self) -> String {
    stable_hash(canonical_json(&self.identity()).as_bytes())
  }

  /// Build the raw event this envelope describes for `user_id`.
  pub fn into_raw_event(
    self,
    user_id: &str,
    received_at: DateTime<Utc>,
  ) -> RawEvent {
    let fingerprint = self.fingerprint();
    let id = raw_event_id(
      &self.provider,
      self.idempotency_key.as_deref(),
      &self.identity(),
    );

    RawEvent {
      id,
      user_id: user_id.to_owned(),
      source_id: self.provider,
      kind: self.kind,
      payload: self.payload,
      observed_at: self.occurred_at,
      time_zone: self.time_zone,
      received_at,
      schema_version: self.schema_version.unwrap_or(SCHEMA_VERSION),
      provenance: self.provenance,
      correction_of_raw_event_id: self.correction_of_raw_event_id,
      uncertainty_state: self.uncertainty_state,
      fingerprint,
    }
  }
}

// ─── Webhook receipt ─────────────────────────────────────────────────────────

/// A verified provider notification, stored exactly once per event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReceipt {
  pub id:               String,
  pub provider:         Provider,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provider_user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_type:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data_type:        Option<String>,
  pub body:             Value,
  pub received_at:      DateTime<Utc>,
}
