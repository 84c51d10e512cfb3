//! Intelligence context: the read-optimised, per-day fold of daily facts,
//! insights and readiness metadata, so a client needs one fetch instead of
//! three. It never originates facts or insights of its own.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{facts::Domain, insight::Severity};

/// Selected fact fields, flattened for direct consumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sleep_total_minutes: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub main_sleep_minutes:  Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sleep_efficiency:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub steps:               Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance_km:         Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub training_load:       Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hrv_rmssd_ms:        Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hrv_baseline_ms:     Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub weight_kg:           Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body_fat_percent:    Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nutrition_kcal:      Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protein_g:           Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub strength_volume_kg:  Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRollup {
  pub count:      u32,
  pub kinds:      Vec<String>,
  pub tags:       Vec<String>,
  pub severities: BTreeMap<Severity, u32>,
  pub ids:        Vec<String>,
}

/// Which inputs were actually present when the context was assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReadiness {
  pub has_daily_facts:         bool,
  pub has_insights:            bool,
  pub domain_meets_confidence: BTreeMap<Domain, bool>,
}

/// One per `(user_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceContext {
  pub user_id:          String,
  pub date:             NaiveDate,
  pub schema_version:   u32,
  pub facts:            ContextFacts,
  pub insights:         InsightRollup,
  pub readiness:        ContextReadiness,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub confidence:       Option<BTreeMap<Domain, f64>>,
  pub computed_at:      DateTime<Utc>,
  pub pipeline_version: u32,
}
