//! The combined per-day read model served to clients.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  canonical::CanonicalEvent, context::IntelligenceContext, facts::DailyFacts,
  insight::Insight,
};

/// Readiness inputs a client needs before trusting the derived documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMeta {
  /// Canonical events currently bucketed to the day.
  pub events_count:              u32,
  /// Newest `created_at` among those events.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latest_canonical_event_at: Option<DateTime<Utc>>,
  /// When the daily facts were last computed.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub computed_at:               Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pipeline_version:          Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTruth {
  pub ok:                   bool,
  pub user_id:              String,
  pub date:                 NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub daily_facts:          Option<DailyFacts>,
  #[serde(default)]
  pub insights:             Vec<Insight>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub intelligence_context: Option<IntelligenceContext>,
  pub meta:                 DayMeta,
}

impl DayTruth {
  /// Meta is taken from the live canonical events, not from the facts
  /// document, so a day whose facts lag behind new events reads as stale.
  pub fn new(
    user_id: &str,
    date: NaiveDate,
    events: &[CanonicalEvent],
    daily_facts: Option<DailyFacts>,
    insights: Vec<Insight>,
    intelligence_context: Option<IntelligenceContext>,
  ) -> Self {
    let meta = DayMeta {
      events_count:              u32::try_from(events.len()).unwrap_or(u32::MAX),
      latest_canonical_event_at: events.iter().map(|e| e.created_at).max(),
      computed_at:               daily_facts.as_ref().map(|f| f.computed_at),
      pipeline_version:          daily_facts
        .as_ref()
        .map(|f| f.pipeline_version)
        .or_else(|| intelligence_context.as_ref().map(|c| c.pipeline_version)),
    };
    Self {
      ok: true,
      user_id: user_id.to_owned(),
      date,
      daily_facts,
      insights,
      intelligence_context,
      meta,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn empty_day_has_zero_events_and_no_meta() {
    let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let day = DayTruth::new("u1", date, &[], None, vec![], None);
    assert_eq!(day.meta, DayMeta::default());

    let value = serde_json::to_value(&day).unwrap();
    assert_eq!(
      value,
      json!({
        "ok": true,
        "userId": "u1",
        "date": "2025-01-15",
        "insights": [],
        "meta": { "eventsCount": 0 }
      })
    );
  }

  #[test]
  fn meta_comes_from_facts_when_present() {
    let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let computed = Utc.with_ymd_and_hms(2025, 1, 16, 2, 0, 0).unwrap();
    let facts: DailyFacts = serde_json::from_value(json!({
      "userId": "u1",
      "date": "2025-01-15",
      "schemaVersion": 1,
      "meta": { "eventsCount": 0 },
      "computedAt": computed,
      "pipelineVersion": 1
    }))
    .unwrap();

    let day = DayTruth::new("u1", date, &[], Some(facts), vec![], None);
    assert_eq!(day.meta.computed_at, Some(computed));
    assert_eq!(day.meta.pipeline_version, Some(1));
  }
}
