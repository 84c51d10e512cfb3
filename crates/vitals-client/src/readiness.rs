//! Fail-closed readiness gate for a day's derived truth.
//!
//! [`resolve`] is an ordered decision table. The first matching rule wins,
//! and the order matters: a payload that is both schema-invalid and stale
//! must report the contract violation, not the timing window.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NetworkState {
  Loading,
  Ok,
  Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReadinessState {
  Loading,
  Empty,
  Invalid,
  Partial,
  Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReadinessReason {
  NetworkLoading,
  NetworkError,
  NoEvents,
  InvalidPayload,
  MissingMeta,
  PipelineVersionMismatch,
  StaleDerived,
  Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
  pub state:  ReadinessState,
  pub reason: ReadinessReason,
}

impl Readiness {
  const fn new(state: ReadinessState, reason: ReadinessReason) -> Self { Self { state, reason } }

  pub fn is_ready(self) -> bool { self.state == ReadinessState::Ready }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessInput {
  pub network:                       NetworkState,
  /// The full document passed its contract.
  pub contract_valid:                bool,
  /// `None` while the count is still unknown.
  pub events_count:                  Option<u64>,
  pub computed_at_iso:               Option<String>,
  pub latest_canonical_event_at_iso: Option<String>,
  pub pipeline_version:              Option<u32>,
  pub expected_pipeline_version:     u32,
}

/// An absent or unparsable timestamp is treated as missing.
fn timestamp(iso: Option<&str>) -> Option<DateTime<FixedOffset>> {
  iso.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
}

pub fn resolve(input: &ReadinessInput) -> Readiness {
  use ReadinessReason as R;
  use ReadinessState as S;

  let computed_at = timestamp(input.computed_at_iso.as_deref());
  let latest_event_at = timestamp(input.latest_canonical_event_at_iso.as_deref());

  match input.network {
    NetworkState::Loading => return Readiness::new(S::Loading, R::NetworkLoading),
    NetworkState::Error => return Readiness::new(S::Invalid, R::NetworkError),
    NetworkState::Ok => {}
  }

  let Some(events_count) = input.events_count else {
    return Readiness::new(S::Loading, R::NetworkLoading);
  };
  if events_count == 0 && computed_at.is_none() {
    return Readiness::new(S::Empty, R::NoEvents);
  }
  if !input.contract_valid {
    return Readiness::new(S::Partial, R::InvalidPayload);
  }
  // Fact-only days (no events) do not need an event timestamp.
  if computed_at.is_none() || (events_count > 0 && latest_event_at.is_none()) {
    return Readiness::new(S::Partial, R::MissingMeta);
  }
  if input.pipeline_version != Some(input.expected_pipeline_version) {
    return Readiness::new(S::Invalid, R::PipelineVersionMismatch);
  }
  if let (Some(computed), Some(latest)) = (computed_at, latest_event_at)
    && computed < latest
  {
    return Readiness::new(S::Partial, R::StaleDerived);
  }
  Readiness::new(S::Ready, R::Ready)
}
