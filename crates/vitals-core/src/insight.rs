//! Insights: rule-generated observations over a window of daily facts.
//!
//! Insights are generated, never hand-edited. Regenerating a day replaces the
//! prior insights of every evaluated kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Info,
  Warning,
  Critical,
}

/// Which side of a threshold the observed value fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Above,
  Below,
}

/// One pointer from an insight back to the fact that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
  /// Dotted path into a daily facts document, e.g. `sleep.totalMinutes`.
  pub fact_path: String,
  pub value:     Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub threshold: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub direction: Option<Direction>,
}

/// One record per `(user_id, date, kind)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
  /// `{date}_{kind}`.
  pub id:             String,
  pub user_id:        String,
  pub date:           NaiveDate,
  pub kind:           String,
  pub severity:       Severity,
  pub title:          String,
  pub message:        String,
  pub evidence:       Vec<Evidence>,
  #[serde(default)]
  pub tags:           Vec<String>,
  pub rule_version:   String,
  pub schema_version: u32,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Insight {
  pub fn id_for(date: NaiveDate, kind: &str) -> String { format!("{date}_{kind}") }
}
