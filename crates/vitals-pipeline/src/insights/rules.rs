//! The `insights-v1` rules. Each is a pure function of the window.

use serde_json::json;
use vitals_core::{
  facts::DailyFacts,
  insight::{Direction, Evidence, Severity},
};

use super::{InsightWindow, RuleOutcome};

const SLEEP_TARGET_MINUTES: f64 = 420.0;
const SLEEP_CRITICAL_MINUTES: f64 = 360.0;
const HRV_WARNING_RATIO: f64 = 0.85;
const HRV_CRITICAL_RATIO: f64 = 0.70;
const LOAD_WARNING_RATIO: f64 = 1.5;
const LOAD_CRITICAL_RATIO: f64 = 2.0;
const LOW_STEPS: u64 = 5000;
const WEIGHT_CHANGE_RATIO: f64 = 0.02;
const MIN_BASELINE_DAYS: usize = 3;

fn mean(values: &[f64]) -> Option<f64> {
  (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn round1(v: f64) -> f64 { (v * 10.0).round() / 10.0 }

fn evidence(path: &str, value: f64, threshold: Option<f64>, direction: Option<Direction>) -> Evidence {
  Evidence {
    fact_path: path.to_owned(),
    value: json!(round1(value)),
    threshold: threshold.map(round1),
    direction,
  }
}

fn tags(tags: &[&str]) -> Vec<String> { tags.iter().map(|t| (*t).to_owned()).collect() }

/// Prior-day values of one field, oldest first.
fn prior_values(window: &InsightWindow, field: impl Fn(&DailyFacts) -> Option<f64>) -> Vec<f64> {
  window.prior().filter_map(field).collect()
}

// ─── Sleep ───────────────────────────────────────────────────────────────────

pub fn sleep_debt(window: &InsightWindow) -> Option<RuleOutcome> {
  let minutes: Vec<f64> = window
    .facts()
    .iter()
    .filter_map(|f| f.sleep.as_ref()?.total_minutes)
    .collect();
  if minutes.len() < MIN_BASELINE_DAYS {
    return None;
  }
  let avg = mean(&minutes)?;

  let (severity, threshold) = if avg < SLEEP_CRITICAL_MINUTES {
    (Severity::Critical, SLEEP_CRITICAL_MINUTES)
  } else if avg < SLEEP_TARGET_MINUTES {
    (Severity::Warning, SLEEP_TARGET_MINUTES)
  } else {
    return None;
  };

  Some(RuleOutcome {
    severity,
    title: "Sleep debt building".to_owned(),
    message: format!(
      "You averaged {:.0} minutes of sleep over {} nights, below the {:.0} minute target.",
      avg,
      minutes.len(),
      SLEEP_TARGET_MINUTES
    ),
    evidence: vec![evidence(
      "sleep.totalMinutes",
      avg,
      Some(threshold),
      Some(Direction::Below),
    )],
    tags: tags(&["sleep"]),
  })
}

// ─── Recovery ────────────────────────────────────────────────────────────────

pub fn hrv_drop(window: &InsightWindow) -> Option<RuleOutcome> {
  let today = window.today()?.recovery.as_ref()?.hrv_rmssd_ms?;
  let prior = prior_values(window, |f| f.recovery.as_ref()?.hrv_rmssd_ms);
  if prior.len() < MIN_BASELINE_DAYS {
    return None;
  }
  let baseline = mean(&prior).filter(|b| *b > 0.0)?;
  let ratio = today / baseline;

  let (severity, factor) = if ratio < HRV_CRITICAL_RATIO {
    (Severity::Critical, HRV_CRITICAL_RATIO)
  } else if ratio < HRV_WARNING_RATIO {
    (Severity::Warning, HRV_WARNING_RATIO)
  } else {
    return None;
  };

  Some(RuleOutcome {
    severity,
    title: "HRV below baseline".to_owned(),
    message: format!(
      "Today's HRV of {today:.0} ms is {:.0}% of your {baseline:.0} ms baseline.",
      ratio * 100.0
    ),
    evidence: vec![
      evidence(
        "recovery.hrvRmssdMs",
        today,
        Some(baseline * factor),
        Some(Direction::Below),
      ),
      evidence("recovery.hrvBaselineMs", baseline, None, None),
    ],
    tags: tags(&["recovery", "hrv"]),
  })
}

// ─── Activity ────────────────────────────────────────────────────────────────

pub fn training_load_spike(window: &InsightWindow) -> Option<RuleOutcome> {
  let today = window.today()?.activity.as_ref()?.training_load?;
  let prior = prior_values(window, |f| f.activity.as_ref()?.training_load);
  if prior.len() < MIN_BASELINE_DAYS {
    return None;
  }
  let baseline = mean(&prior).filter(|b| *b > 0.0)?;
  let ratio = today / baseline;

  let (severity, factor) = if ratio > LOAD_CRITICAL_RATIO {
    (Severity::Critical, LOAD_CRITICAL_RATIO)
  } else if ratio > LOAD_WARNING_RATIO {
    (Severity::Warning, LOAD_WARNING_RATIO)
  } else {
    return None;
  };

  Some(RuleOutcome {
    severity,
    title: "Training load spike".to_owned(),
    message: format!(
      "Today's training load of {today:.0} is {ratio:.1}x your recent average of {baseline:.0}."
    ),
    evidence: vec![evidence(
      "activity.trainingLoad",
      today,
      Some(baseline * factor),
      Some(Direction::Above),
    )],
    tags: tags(&["activity", "training"]),
  })
}

pub fn low_activity(window: &InsightWindow) -> Option<RuleOutcome> {
  let steps = window.today()?.activity.as_ref()?.steps?;
  if steps >= LOW_STEPS {
    return None;
  }

  Some(RuleOutcome {
    severity: Severity::Info,
    title:    "Low activity".to_owned(),
    message:  format!("You logged {steps} steps today, under {LOW_STEPS}."),
    evidence: vec![Evidence {
      fact_path: "activity.steps".to_owned(),
      value:     json!(steps),
      threshold: Some(LOW_STEPS as f64),
      direction: Some(Direction::Below),
    }],
    tags:     tags(&["activity"]),
  })
}

// ─── Body ────────────────────────────────────────────────────────────────────

/// "this week" for a seven day window, otherwise the day count.
fn span(days: u32) -> String {
  if days == 7 {
    "this week".to_owned()
  } else {
    format!("over the last {days} days")
  }
}

pub fn weight_change(window: &InsightWindow) -> Option<RuleOutcome> {
  let weights: Vec<f64> = window
    .facts()
    .iter()
    .filter_map(|f| f.body.as_ref().map(|b| b.weight_kg))
    .collect();
  let (first, latest) = (*weights.first()?, *weights.last()?);
  if weights.len() < 2 || first <= 0.0 {
    return None;
  }
  let change = (latest - first) / first;
  if change.abs() < WEIGHT_CHANGE_RATIO {
    return None;
  }

  let (direction, word) = if change > 0.0 {
    (Direction::Above, "gain")
  } else {
    (Direction::Below, "loss")
  };

  Some(RuleOutcome {
    severity: Severity::Info,
    title: format!("Weight {word} {}", span(window.days())),
    message: format!(
      "Your weight moved from {first:.1} kg to {latest:.1} kg ({:+.1}%) over {} days.",
      change * 100.0,
      window.days()
    ),
    evidence: vec![evidence("body.weightKg", latest, Some(first), Some(direction))],
    tags: tags(&["body", "weight", word]),
  })
}
