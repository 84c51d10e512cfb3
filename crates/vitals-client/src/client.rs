//! Typed HTTP client for the vitals API, and the day loader that gates
//! derived truth behind the readiness table.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use vitals_core::{
  PIPELINE_VERSION, context::IntelligenceContext, day::DayTruth, facts::DailyFacts,
  insight::Insight,
};

use crate::{
  Error, Result,
  contract::{ApiFailure, FailureKind, Issue, RawResponse, RawResult, validate},
  fence::RequestFence,
  readiness::{NetworkState, Readiness, ReadinessInput, resolve},
};

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TruthClient {
  http:     Client,
  base_url: String,
}

impl TruthClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(Error::Client)?;
    Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }

  /// `GET {path}`, classified but not yet trusted.
  pub async fn get_raw(&self, path: &str) -> RawResult {
    let resp = self
      .http
      .get(self.url(path))
      .send()
      .await
      .map_err(|e| ApiFailure::network(e.to_string()))?;
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(|e| ApiFailure::network(e.to_string()))?;
    let json: Option<Value> = serde_json::from_slice(&bytes).ok();

    if !status.is_success() {
      let error = json
        .as_ref()
        .and_then(|j| j.get("error"))
        .and_then(Value::as_str)
        .map_or_else(|| status.to_string(), str::to_owned);
      return Err(ApiFailure::http(status.as_u16(), error, json));
    }

    json.map(|json| RawResponse { status: status.as_u16(), json }).ok_or_else(|| {
      ApiFailure::contract(Some(status.as_u16()), vec![Issue {
        path:    ".".into(),
        message: "body is not JSON".into(),
      }])
    })
  }

  /// `GET /users/{uid}/daily-facts/{date}`
  pub async fn daily_facts(&self, uid: &str, date: NaiveDate) -> Result<DailyFacts, ApiFailure> {
    validate(self.get_raw(&format!("/users/{uid}/daily-facts/{date}")).await)
  }

  /// `GET /users/{uid}/insights/{date}`
  pub async fn insights(&self, uid: &str, date: NaiveDate) -> Result<Vec<Insight>, ApiFailure> {
    validate(self.get_raw(&format!("/users/{uid}/insights/{date}")).await)
  }

  /// `GET /users/{uid}/intelligence-context/{date}`
  pub async fn intelligence_context(
    &self,
    uid: &str,
    date: NaiveDate,
  ) -> Result<IntelligenceContext, ApiFailure> {
    validate(self.get_raw(&format!("/users/{uid}/intelligence-context/{date}")).await)
  }

  /// `GET /users/{uid}/days/{date}`, unvalidated.
  pub async fn day_raw(&self, uid: &str, date: NaiveDate) -> RawResult {
    self.get_raw(&format!("/users/{uid}/days/{date}")).await
  }
}

// ─── Day loader ──────────────────────────────────────────────────────────────

/// The outcome of one day load. `truth` is only ever present when the day
/// resolved as ready.
#[derive(Debug, Clone, PartialEq)]
pub struct DayView {
  pub readiness: Readiness,
  pub truth:     Option<DayTruth>,
  /// Why the payload was not trusted, when it wasn't.
  pub failure:   Option<ApiFailure>,
}

pub struct DayTruthLoader {
  client:                    TruthClient,
  fence:                     RequestFence,
  expected_pipeline_version: u32,
}

impl DayTruthLoader {
  pub fn new(client: TruthClient) -> Self {
    Self {
      client,
      fence: RequestFence::new(),
      expected_pipeline_version: PIPELINE_VERSION,
    }
  }

  pub fn with_expected_pipeline_version(mut self, version: u32) -> Self {
    self.expected_pipeline_version = version;
    self
  }

  /// Load one day. Returns `None` when a newer load started while this one
  /// was in flight.
  pub async fn load(&self, uid: &str, date: NaiveDate) -> Option<DayView> {
    let ticket = self.fence.begin();
    let raw = self.client.day_raw(uid, date).await;
    if !self.fence.is_current(ticket) {
      tracing::debug!(uid, %date, "discarding superseded day load");
      return None;
    }
    Some(self.view(raw))
  }

  /// Resolve readiness for a fetched day. Readiness inputs are read leniently
  /// from the `meta` envelope; trust comes only from the full contract.
  pub fn view(&self, raw: RawResult) -> DayView {
    let meta = match &raw {
      Ok(resp) => resp.json.get("meta").cloned().unwrap_or(Value::Null),
      Err(_) => Value::Null,
    };
    let network = match &raw {
      Err(f) if f.kind != FailureKind::Contract => NetworkState::Error,
      _ => NetworkState::Ok,
    };

    let (truth, failure) = match validate::<DayTruth>(raw) {
      Ok(truth) => (Some(truth), None),
      Err(f) => (None, Some(f)),
    };

    let input = ReadinessInput {
      network,
      contract_valid: truth.is_some(),
      events_count: meta.get("eventsCount").and_then(Value::as_u64),
      computed_at_iso: meta.get("computedAt").and_then(Value::as_str).map(str::to_owned),
      latest_canonical_event_at_iso: meta
        .get("latestCanonicalEventAt")
        .and_then(Value::as_str)
        .map(str::to_owned),
      pipeline_version: meta
        .get("pipelineVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok()),
      expected_pipeline_version: self.expected_pipeline_version,
    };
    let readiness = resolve(&input);

    DayView {
      readiness,
      truth: truth.filter(|_| readiness.is_ready()),
      failure,
    }
  }
}
