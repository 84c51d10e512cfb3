//! Daily facts: the deterministic per-user, per-day aggregate.
//!
//! Every domain and every field inside a domain is optional. An absent field
//! means "no contributing measurement"; a present `0` means "measured as
//! zero". Absent values are omitted from the serialised document, never
//! written as `null`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A grouping of facts within a day.
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
pub enum Domain {
  Sleep,
  Activity,
  Body,
  Recovery,
  Nutrition,
  Strength,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_minutes:      Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub main_sleep_minutes: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub efficiency:         Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latency_minutes:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub awakenings:         Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub steps:           Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance_km:     Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub training_load:   Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workout_minutes: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workout_count:   Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyFacts {
  pub weight_kg:        f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body_fat_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hrv_rmssd_ms:     Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hrv_sample_count: Option<u32>,
  /// Mean of the preceding days' `hrv_rmssd_ms`; needs rolling history.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hrv_baseline_ms:  Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_kcal: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protein_g:  Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub carbs_g:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fat_g:      Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_sets:      Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_reps:      Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_volume_kg: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exercise_count:  Option<u32>,
}

/// Provenance of the aggregate: what went into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactsMeta {
  pub events_count:              u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latest_canonical_event_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub source_ids:                Vec<String>,
}

/// One document per `(user_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFacts {
  pub user_id:          String,
  pub date:             NaiveDate,
  pub schema_version:   u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sleep:            Option<SleepFacts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activity:         Option<ActivityFacts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body:             Option<BodyFacts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recovery:         Option<RecoveryFacts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nutrition:        Option<NutritionFacts>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub strength:         Option<StrengthFacts>,
  /// Per-domain confidence in `[0, 1]`, present only for present domains.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub confidence:       BTreeMap<Domain, f64>,
  pub meta:             FactsMeta,
  pub computed_at:      DateTime<Utc>,
  pub pipeline_version: u32,
}

impl DailyFacts {
  /// Domains with at least one contributing value.
  pub fn present_domains(&self) -> Vec<Domain> {
    let mut out = Vec::new();
    if self.sleep.is_some() {
      out.push(Domain::Sleep);
    }
    if self.activity.is_some() {
      out.push(Domain::Activity);
    }
    if self.body.is_some() {
      out.push(Domain::Body);
    }
    if self.recovery.is_some() {
      out.push(Domain::Recovery);
    }
    if self.nutrition.is_some() {
      out.push(Domain::Nutrition);
    }
    if self.strength.is_some() {
      out.push(Domain::Strength);
    }
    out
  }

  /// True when the two documents agree on everything but `computed_at`.
  pub fn same_facts_as(&self, other: &DailyFacts) -> bool {
    let mut other = other.clone();
    other.computed_at = self.computed_at;
    *self == other
  }
}

/// Parse a `YYYY-MM-DD` day key.
pub fn parse_day(s: &str) -> crate::Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|_| crate::Error::InvalidDate(s.to_owned()))
}
