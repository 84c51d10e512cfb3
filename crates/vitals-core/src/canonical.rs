//! Canonical events: validated, normalised, day-bucketed events.
//!
//! Exactly one canonical event is derived from a raw event (or none, in which
//! case a [`crate::failure::Failure`] records why). The canonical id is the
//! raw event id.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventKind, UncertaintyState};

// ─── Kind-specific fields ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepFields {
  pub total_minutes:   f64,
  /// Whether this session is the night's main sleep (as opposed to a nap).
  pub is_main_sleep:   bool,
  /// Percentage, 0–100.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub efficiency:      Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latency_minutes: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub awakenings:      Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsFields {
  pub steps:       u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutFields {
  pub sport:            String,
  pub duration_minutes: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub training_load:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub calories_kcal:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avg_heart_rate:   Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightFields {
  pub weight_kg:        f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body_fat_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvFields {
  pub rmssd_ms:         f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub measurement_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFields {
  pub total_kcal: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protein_g:  Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub carbs_g:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fat_g:      Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthSet {
  pub reps:    u32,
  pub load_kg: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rpe:     Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthExercise {
  pub name: String,
  pub sets: Vec<StrengthSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthFields {
  pub exercises: Vec<StrengthExercise>,
}

/// The typed, kind-specific part of a canonical event. The variant name is
/// the `kind` discriminant on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalBody {
  Sleep(SleepFields),
  Steps(StepsFields),
  Workout(WorkoutFields),
  Weight(WeightFields),
  Hrv(HrvFields),
  Nutrition(NutritionFields),
  StrengthWorkout(StrengthFields),
}

impl CanonicalBody {
  pub fn kind(&self) -> EventKind {
    match self {
      Self::Sleep(_) => EventKind::Sleep,
      Self::Steps(_) => EventKind::Steps,
      Self::Workout(_) => EventKind::Workout,
      Self::Weight(_) => EventKind::Weight,
      Self::Hrv(_) => EventKind::Hrv,
      Self::Nutrition(_) => EventKind::Nutrition,
      Self::StrengthWorkout(_) => EventKind::StrengthWorkout,
    }
  }
}

// ─── CanonicalEvent ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
  /// Same as the source raw event id.
  pub id:                         String,
  pub user_id:                    String,
  pub source_id:                  String,
  pub start:                      DateTime<Utc>,
  pub end:                        DateTime<Utc>,
  /// Calendar day of `start` in `timezone`.
  pub day:                        NaiveDate,
  /// IANA zone used for `day`; `"UTC"` when the event's own zone was absent
  /// or invalid.
  pub timezone:                   String,
  pub schema_version:             u32,
  pub uncertainty_state:          UncertaintyState,
  /// The raw event this one corrects. A corrected event drops out of
  /// aggregation once its correction is bucketed to the same day.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correction_of_raw_event_id: Option<String>,
  /// When the mapper produced this event. Used for staleness checks, never
  /// for aggregation.
  pub created_at:                 DateTime<Utc>,
  #[serde(flatten)]
  pub body:                       CanonicalBody,
}

impl CanonicalEvent {
  pub fn kind(&self) -> EventKind { self.body.kind() }

  /// `start` rendered as a fixed-width ISO-8601 UTC string. Lexicographic
  /// order of these strings is the ordering used by latest-wins folds.
  pub fn start_iso(&self) -> String {
    self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
  }
}
