//! The client trust boundary: raw JSON is parsed against a typed contract
//! before any caller sees it.
//!
//! Transport failures pass through untouched. A response that arrived but
//! does not match its contract becomes a [`FailureKind::Contract`] failure
//! listing every issue found, never a partial value.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use strum::{AsRefStr, Display};
use vitals_core::{
  context::IntelligenceContext, day::DayTruth, facts::DailyFacts, insight::Insight,
};

pub const INVALID_SHAPE: &str = "Invalid response shape";

// ─── Raw results ─────────────────────────────────────────────────────────────

/// A successful HTTP exchange with a JSON body, not yet trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
  pub status: u16,
  pub json:   Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
  /// No response: connection refused, timeout, unreadable body.
  Network,
  /// The server answered with a non-2xx status.
  Http,
  /// The server answered 2xx with something other than the contract.
  Contract,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiFailure {
  pub kind:   FailureKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<u16>,
  pub error:  String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub json:   Option<Value>,
}

impl ApiFailure {
  pub fn network(error: impl Into<String>) -> Self {
    Self { kind: FailureKind::Network, status: None, error: error.into(), json: None }
  }

  pub fn http(status: u16, error: impl Into<String>, json: Option<Value>) -> Self {
    Self { kind: FailureKind::Http, status: Some(status), error: error.into(), json }
  }

  pub fn contract(status: Option<u16>, issues: Vec<Issue>) -> Self {
    Self {
      kind: FailureKind::Contract,
      status,
      error: INVALID_SHAPE.to_owned(),
      json: Some(json!({ "issues": issues })),
    }
  }
}

pub type RawResult = Result<RawResponse, ApiFailure>;

// ─── Issues ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
  pub path:    String,
  pub message: String,
}

/// Semantic issues collected by [`Contract::check`].
#[derive(Debug, Default)]
pub struct Issues(Vec<Issue>);

impl Issues {
  pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
    self.0.push(Issue { path: path.into(), message: message.into() });
  }

  /// Record an issue at `path` unless `ok`.
  pub fn ensure(&mut self, ok: bool, path: impl Into<String>, message: impl Into<String>) {
    if !ok {
      self.push(path, message);
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn into_vec(self) -> Vec<Issue> { self.0 }
}

// ─── Contracts ───────────────────────────────────────────────────────────────

/// A response type the client is willing to trust once it parses and passes
/// [`check`](Contract::check).
pub trait Contract: DeserializeOwned {
  /// Invariants the type system cannot express.
  fn check(&self, _issues: &mut Issues) {}
}

/// Parse a raw result against `T`'s contract.
pub fn validate<T: Contract>(raw: RawResult) -> Result<T, ApiFailure> {
  let RawResponse { status, json } = raw?;

  let value: T = serde_path_to_error::deserialize(&json).map_err(|e| {
    let path = e.path().to_string();
    ApiFailure::contract(Some(status), vec![Issue {
      path,
      message: e.into_inner().to_string(),
    }])
  })?;

  let mut issues = Issues::default();
  value.check(&mut issues);
  if issues.is_empty() {
    Ok(value)
  } else {
    tracing::debug!(status, "response failed contract checks");
    Err(ApiFailure::contract(Some(status), issues.into_vec()))
  }
}

fn check_facts(facts: &DailyFacts, prefix: &str, issues: &mut Issues) {
  for (domain, c) in &facts.confidence {
    issues.ensure(
      (0.0..=1.0).contains(c),
      format!("{prefix}confidence.{domain}"),
      "confidence must be within [0, 1]",
    );
  }
  for domain in facts.confidence.keys() {
    issues.ensure(
      facts.present_domains().contains(domain),
      format!("{prefix}confidence.{domain}"),
      "confidence given for an absent domain",
    );
  }
}

impl Contract for DailyFacts {
  fn check(&self, issues: &mut Issues) {
    issues.ensure(!self.user_id.is_empty(), "userId", "must not be empty");
    check_facts(self, "", issues);
  }
}

impl Contract for Vec<Insight> {
  fn check(&self, issues: &mut Issues) {
    for (i, insight) in self.iter().enumerate() {
      issues.ensure(
        insight.id == Insight::id_for(insight.date, &insight.kind),
        format!("[{i}].id"),
        "id must be {date}_{kind}",
      );
    }
  }
}

impl Contract for IntelligenceContext {
  fn check(&self, issues: &mut Issues) {
    issues.ensure(!self.user_id.is_empty(), "userId", "must not be empty");
  }
}

impl Contract for DayTruth {
  fn check(&self, issues: &mut Issues) {
    issues.ensure(self.ok, "ok", "must be true");
    issues.ensure(!self.user_id.is_empty(), "userId", "must not be empty");

    if let Some(facts) = &self.daily_facts {
      issues.ensure(facts.date == self.date, "dailyFacts.date", "does not match the day");
      issues.ensure(
        facts.user_id == self.user_id,
        "dailyFacts.userId",
        "does not match the user",
      );
      check_facts(facts, "dailyFacts.", issues);
    }
    for (i, insight) in self.insights.iter().enumerate() {
      issues.ensure(
        insight.date == self.date,
        format!("insights[{i}].date"),
        "does not match the day",
      );
    }
    if let Some(context) = &self.intelligence_context {
      issues.ensure(
        context.date == self.date,
        "intelligenceContext.date",
        "does not match the day",
      );
    }
  }
}
