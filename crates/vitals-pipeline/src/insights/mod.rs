//! The insight rule engine.
//!
//! A versioned, ordered list of pure rules is evaluated over an
//! [`InsightWindow`] of daily facts. Each rule independently emits or skips.
//! Nothing here reads the clock: `now` is always passed in, so a window can
//! be replayed against history and produce the same insights.

mod rules;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use vitals_core::{
  SCHEMA_VERSION,
  facts::DailyFacts,
  insight::{Evidence, Insight, Severity},
};

use crate::{Error, Result};

/// Version tag stamped on every insight this rule set produces.
pub const RULESET_VERSION: &str = "insights-v1";

/// Shortest window the rules are defined over.
pub const MIN_WINDOW_DAYS: u32 = 7;

// ─── Window ──────────────────────────────────────────────────────────────────

/// The daily facts of one user over `[date - days + 1, date]`.
#[derive(Debug, Clone)]
pub struct InsightWindow {
  user_id: String,
  date:    NaiveDate,
  days:    u32,
  /// Ascending by date, at most one document per date.
  facts:   Vec<DailyFacts>,
}

impl InsightWindow {
  /// Build a window ending on `date`. Facts for other users or outside the
  /// window are dropped; for a repeated date the last one wins.
  pub fn new(
    user_id: &str,
    date: NaiveDate,
    days: u32,
    facts: impl IntoIterator<Item = DailyFacts>,
  ) -> Result<Self> {
    if days < MIN_WINDOW_DAYS {
      return Err(Error::WindowTooShort { days, min: MIN_WINDOW_DAYS });
    }
    let start = window_start(date, days);
    let by_date: BTreeMap<NaiveDate, DailyFacts> = facts
      .into_iter()
      .filter(|f| f.user_id == user_id && f.date >= start && f.date <= date)
      .map(|f| (f.date, f))
      .collect();

    Ok(Self {
      user_id: user_id.to_owned(),
      date,
      days,
      facts: by_date.into_values().collect(),
    })
  }

  pub fn user_id(&self) -> &str { &self.user_id }

  pub fn date(&self) -> NaiveDate { self.date }

  pub fn days(&self) -> u32 { self.days }

  pub fn start(&self) -> NaiveDate { window_start(self.date, self.days) }

  /// Every document in the window, oldest first.
  pub fn facts(&self) -> &[DailyFacts] { &self.facts }

  /// The document for the window's last day, if one exists.
  pub fn today(&self) -> Option<&DailyFacts> {
    self.facts.last().filter(|f| f.date == self.date)
  }

  /// Documents strictly before the window's last day.
  pub fn prior(&self) -> impl Iterator<Item = &DailyFacts> {
    self.facts.iter().filter(|f| f.date < self.date)
  }
}

/// First day of a `days`-long window ending on `date`.
pub fn window_start(date: NaiveDate, days: u32) -> NaiveDate {
  date - Duration::days(i64::from(days.saturating_sub(1)))
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// What a firing rule contributes; the engine fills in identity and versions.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
  pub severity: Severity,
  pub title:    String,
  pub message:  String,
  pub evidence: Vec<Evidence>,
  pub tags:     Vec<String>,
}

pub struct Rule {
  pub kind: &'static str,
  pub eval: fn(&InsightWindow) -> Option<RuleOutcome>,
}

/// The rule set, in evaluation order.
pub const RULES: &[Rule] = &[
  Rule { kind: "sleep_debt", eval: rules::sleep_debt },
  Rule { kind: "hrv_drop", eval: rules::hrv_drop },
  Rule { kind: "training_load_spike", eval: rules::training_load_spike },
  Rule { kind: "low_activity", eval: rules::low_activity },
  Rule { kind: "weight_change", eval: rules::weight_change },
];

/// Every kind the rule set can emit. Replacement clears all of them, so a
/// kind that stops firing disappears.
pub fn rule_kinds() -> Vec<&'static str> { RULES.iter().map(|r| r.kind).collect() }

/// Run every rule over `window`. `previous` holds the insights currently
/// stored for the day; a rerun keeps their `createdAt`.
pub fn evaluate(
  window: &InsightWindow,
  now: DateTime<Utc>,
  previous: &[Insight],
) -> Vec<Insight> {
  RULES
    .iter()
    .filter_map(|rule| {
      let outcome = (rule.eval)(window)?;
      let created_at = previous
        .iter()
        .find(|p| p.kind == rule.kind && p.date == window.date)
        .map_or(now, |p| p.created_at);
      tracing::debug!(
        user_id = %window.user_id,
        day = %window.date,
        kind = rule.kind,
        severity = ?outcome.severity,
        "insight fired"
      );
      Some(Insight {
        id: Insight::id_for(window.date, rule.kind),
        user_id: window.user_id.clone(),
        date: window.date,
        kind: rule.kind.to_owned(),
        severity: outcome.severity,
        title: outcome.title,
        message: outcome.message,
        evidence: outcome.evidence,
        tags: outcome.tags,
        rule_version: RULESET_VERSION.to_owned(),
        schema_version: SCHEMA_VERSION,
        created_at,
        updated_at: now,
      })
    })
    .collect()
}
