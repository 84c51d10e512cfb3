//! The canonical mapper: `RawEvent -> CanonicalEvent`, or a typed rejection.
//!
//! Mapping is pure. The only clock input is `created_at`, supplied by the
//! caller. Checks run in a fixed order: provider, kind, schema version, time
//! range, then the per-kind payload guard.

mod day;
mod kinds;
mod reader;

use std::fmt;

use chrono::{DateTime, Utc};
use vitals_core::{
  SCHEMA_VERSION,
  canonical::{CanonicalBody, CanonicalEvent},
  event::{EventKind, Provider, RawEvent},
  failure::RejectionReason,
};

pub use self::day::{day_for, resolve_zone};
use self::reader::Fields;

// ─── Rejection ───────────────────────────────────────────────────────────────

/// Why a raw event produced no canonical event. A value, never an error: the
/// caller records it as a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
  pub reason:  RejectionReason,
  pub message: String,
  /// Payload path of the offending field, when there is one.
  pub path:    Option<String>,
}

impl Rejection {
  pub fn unsupported_provider(source_id: &str) -> Self {
    Self {
      reason:  RejectionReason::UnsupportedProvider,
      message: format!("unsupported provider: {source_id:?}"),
      path:    None,
    }
  }

  pub fn unsupported_kind(source_id: &str, kind: &str) -> Self {
    Self {
      reason:  RejectionReason::UnsupportedKind,
      message: format!("provider {source_id:?} does not emit kind {kind:?}"),
      path:    None,
    }
  }

  pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      reason:  RejectionReason::MalformedPayload,
      message: message.into(),
      path:    Some(path.into()),
    }
  }
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.path {
      Some(path) => write!(f, "{path}: {}", self.message),
      None => f.write_str(&self.message),
    }
  }
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// Validate `raw` and produce its canonical event.
pub fn map_raw_event(
  raw: &RawEvent,
  created_at: DateTime<Utc>,
) -> Result<CanonicalEvent, Rejection> {
  let provider: Provider = raw
    .source_id
    .parse()
    .map_err(|_| Rejection::unsupported_provider(&raw.source_id))?;

  let kind: EventKind = raw
    .kind
    .parse()
    .ok()
    .filter(|k| provider.supports(*k))
    .ok_or_else(|| Rejection::unsupported_kind(&raw.source_id, &raw.kind))?;

  if raw.schema_version != SCHEMA_VERSION {
    return Err(Rejection::malformed(
      "schemaVersion",
      format!("expected {SCHEMA_VERSION}, got {}", raw.schema_version),
    ));
  }

  let (start, end) = (raw.observed_at.start(), raw.observed_at.end());
  if end < start {
    return Err(Rejection::malformed("occurredAt", "end is before start"));
  }

  let body = map_body(kind, &Fields::root(&raw.payload)?)?;
  let (day, timezone) = day_for(start, raw.time_zone.as_deref());

  Ok(CanonicalEvent {
    id: raw.id.clone(),
    user_id: raw.user_id.clone(),
    source_id: raw.source_id.clone(),
    start,
    end,
    day,
    timezone,
    schema_version: raw.schema_version,
    uncertainty_state: raw.uncertainty_state.unwrap_or_default(),
    correction_of_raw_event_id: raw.correction_of_raw_event_id.clone(),
    created_at,
    body,
  })
}

fn map_body(kind: EventKind, f: &Fields<'_>) -> Result<CanonicalBody, Rejection> {
  Ok(match kind {
    EventKind::Sleep => CanonicalBody::Sleep(kinds::sleep(f)?),
    EventKind::Steps => CanonicalBody::Steps(kinds::steps(f)?),
    EventKind::Workout => CanonicalBody::Workout(kinds::workout(f)?),
    EventKind::Weight => CanonicalBody::Weight(kinds::weight(f)?),
    EventKind::Hrv => CanonicalBody::Hrv(kinds::hrv(f)?),
    EventKind::Nutrition => CanonicalBody::Nutrition(kinds::nutrition(f)?),
    EventKind::StrengthWorkout => CanonicalBody::StrengthWorkout(kinds::strength(f)?),
  })
}
