//! The intelligence context assembler: a read-optimised fold of one day's
//! facts and insights. It copies and counts; it never derives new facts.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use vitals_core::{
  PIPELINE_VERSION, SCHEMA_VERSION,
  context::{ContextFacts, ContextReadiness, InsightRollup, IntelligenceContext},
  facts::{DailyFacts, Domain},
  insight::Insight,
};

/// Thresholds applied while assembling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextPolicy {
  /// A present domain "meets confidence" at or above this score.
  pub min_domain_confidence: f64,
}

impl Default for ContextPolicy {
  fn default() -> Self { Self { min_domain_confidence: 0.6 } }
}

pub fn assemble(
  user_id: &str,
  date: NaiveDate,
  computed_at: DateTime<Utc>,
  facts: Option<&DailyFacts>,
  insights: &[Insight],
  policy: &ContextPolicy,
) -> IntelligenceContext {
  let insights: Vec<&Insight> = insights
    .iter()
    .filter(|i| i.user_id == user_id && i.date == date)
    .collect();

  let domain_meets_confidence: BTreeMap<Domain, bool> = facts
    .map(|f| {
      f.present_domains()
        .into_iter()
        .map(|d| {
          let score = f.confidence.get(&d).copied().unwrap_or(0.0);
          (d, score >= policy.min_domain_confidence)
        })
        .collect()
    })
    .unwrap_or_default();

  IntelligenceContext {
    user_id: user_id.to_owned(),
    date,
    schema_version: SCHEMA_VERSION,
    facts: facts.map(flatten).unwrap_or_default(),
    insights: rollup(&insights),
    readiness: ContextReadiness {
      has_daily_facts: facts.is_some(),
      has_insights: !insights.is_empty(),
      domain_meets_confidence,
    },
    confidence: facts
      .map(|f| f.confidence.clone())
      .filter(|c| !c.is_empty()),
    computed_at,
    pipeline_version: facts.map_or(PIPELINE_VERSION, |f| f.pipeline_version),
  }
}

fn flatten(f: &DailyFacts) -> ContextFacts {
  let sleep = f.sleep.as_ref();
  let activity = f.activity.as_ref();
  let recovery = f.recovery.as_ref();

  ContextFacts {
    sleep_total_minutes: sleep.and_then(|s| s.total_minutes),
    main_sleep_minutes:  sleep.and_then(|s| s.main_sleep_minutes),
    sleep_efficiency:    sleep.and_then(|s| s.efficiency),
    steps:               activity.and_then(|a| a.steps),
    distance_km:         activity.and_then(|a| a.distance_km),
    training_load:       activity.and_then(|a| a.training_load),
    hrv_rmssd_ms:        recovery.and_then(|r| r.hrv_rmssd_ms),
    hrv_baseline_ms:     recovery.and_then(|r| r.hrv_baseline_ms),
    weight_kg:           f.body.as_ref().map(|b| b.weight_kg),
    body_fat_percent:    f.body.as_ref().and_then(|b| b.body_fat_percent),
    nutrition_kcal:      f.nutrition.as_ref().and_then(|n| n.total_kcal),
    protein_g:           f.nutrition.as_ref().and_then(|n| n.protein_g),
    strength_volume_kg:  f.strength.as_ref().and_then(|s| s.total_volume_kg),
  }
}

fn rollup(insights: &[&Insight]) -> InsightRollup {
  let mut severities = BTreeMap::new();
  for i in insights {
    *severities.entry(i.severity).or_insert(0) += 1;
  }

  InsightRollup {
    count: u32::try_from(insights.len()).unwrap_or(u32::MAX),
    kinds: insights.iter().map(|i| i.kind.clone()).collect(),
    tags: insights
      .iter()
      .flat_map(|i| i.tags.iter().cloned())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect(),
    severities,
    ids: insights.iter().map(|i| i.id.clone()).collect(),
  }
}
