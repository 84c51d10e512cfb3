//! JSON HTTP API for the vitals truth pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`TruthStore`]: event ingestion,
//! job triggers, the Oura webhook, and read-only derived truth. Auth and TLS
//! are the caller's responsibility.
//!
//! ```rust,ignore
//! let app = vitals_api::router(AppState { pipeline, resync });
//! ```

pub mod error;
pub mod events;
pub mod jobs;
pub mod truth;
pub mod webhooks;

use axum::{
  Router,
  routing::{get, post},
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use vitals_core::store::TruthStore;
use vitals_pipeline::Pipeline;
use vitals_providers::Resync;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub pipeline: Pipeline<S>,
  pub resync:   Resync<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { pipeline: self.pipeline.clone(), resync: self.resync.clone() }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub fn router<S>(state: AppState<S>) -> Router
where
  S: TruthStore + 'static,
{
  Router::new()
    // Ingestion and jobs
    .route("/users/{uid}/events", post(events::ingest::<S>))
    .route("/jobs/resync", post(jobs::resync::<S>))
    .route("/jobs/recompute", post(jobs::recompute::<S>))
    .route("/webhooks/oura", post(webhooks::oura::<S>))
    // Derived truth
    .route("/users/{uid}/daily-facts/{date}", get(truth::daily_facts::<S>))
    .route("/users/{uid}/insights/{date}", get(truth::insights::<S>))
    .route(
      "/users/{uid}/intelligence-context/{date}",
      get(truth::intelligence_context::<S>),
    )
    .route("/users/{uid}/days/{date}", get(truth::day::<S>))
    .route("/users/{uid}/failures", get(truth::failures::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Bodies are parsed by hand so malformed JSON is a 400 in the common error
/// shape rather than the extractor's own rejection.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use vitals_pipeline::PipelineConfig;
  use vitals_providers::{OuraConfig, ProvidersConfig, ResyncConfig, webhook};
  use vitals_store_sqlite::SqliteStore;

  use super::*;

  const SECRET: &str = "hook-secret";

  async fn make_state(webhook_secret: Option<&str>) -> AppState<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let pipeline = Pipeline::new(store, PipelineConfig::default()).unwrap();
    let providers = ProvidersConfig {
      oura:     webhook_secret.map(|s| OuraConfig {
        api_base:       "http://127.0.0.1:9".into(),
        webhook_secret: Some(s.into()),
      }),
      withings: None,
    };
    let resync = Resync::new(pipeline.clone(), providers, ResyncConfig::default()).unwrap();
    AppState { pipeline, resync }
  }

  async fn send(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    headers: Vec<(&str, &str)>,
    body: impl Into<Body>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    router(state).oneshot(builder.body(body.into()).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn sleep_event() -> String {
    json!({
      "provider": "manual",
      "kind": "sleep",
      "occurredAt": { "start": "2025-01-15T06:00:00Z", "end": "2025-01-15T13:30:00Z" },
      "timeZone": "America/New_York",
      "payload": { "totalMinutes": 450, "isMainSleep": true },
      "idempotencyKey": "night-1"
    })
    .to_string()
  }

  fn json_header() -> Vec<(&'static str, &'static str)> {
    vec![(header::CONTENT_TYPE.as_str(), "application/json")]
  }

  // ── Ingestion ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ingest_creates_then_deduplicates() {
    let state = make_state(None).await;

    let first = send(state.clone(), "POST", "/users/u1/events", json_header(), sleep_event()).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let body = json_body(first).await;
    assert_eq!(body["rawEventId"], "manual_night-1");
    assert_eq!(body["dedup"], false);
    assert_eq!(body["day"], "2025-01-15");

    let again = send(state, "POST", "/users/u1/events", json_header(), sleep_event()).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(json_body(again).await["dedup"], true);
  }

  #[tokio::test]
  async fn malformed_event_body_is_400() {
    let state = make_state(None).await;
    let resp = send(state, "POST", "/users/u1/events", json_header(), "{nope").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("invalid JSON"));
  }

  #[tokio::test]
  async fn empty_provider_is_400() {
    let state = make_state(None).await;
    let event = json!({
      "provider": "",
      "kind": "steps",
      "occurredAt": "2025-01-15T12:00:00Z",
      "payload": { "steps": 10 }
    });
    let resp = send(state, "POST", "/users/u1/events", json_header(), event.to_string()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn rejected_event_is_listed_as_failure() {
    let state = make_state(None).await;
    let event = json!({
      "provider": "manual",
      "kind": "steps",
      "occurredAt": "2025-01-15T12:00:00Z",
      "payload": { "steps": -3 }
    });
    let resp =
      send(state.clone(), "POST", "/users/u1/events", json_header(), event.to_string()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(json_body(resp).await["failureId"].is_string());

    let resp = send(state, "GET", "/users/u1/failures?limit=5", vec![], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let failures = json_body(resp).await;
    assert_eq!(failures.as_array().unwrap().len(), 1);
    assert_eq!(failures[0]["kind"], "RAW_EVENT_INVALID");
  }

  // ── Derived truth ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn day_truth_after_ingest() {
    let state = make_state(None).await;
    send(state.clone(), "POST", "/users/u1/events", json_header(), sleep_event()).await;

    let resp = send(state.clone(), "GET", "/users/u1/days/2025-01-15", vec![], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let day = json_body(resp).await;
    assert_eq!(day["ok"], true);
    assert_eq!(day["meta"]["eventsCount"], 1);
    assert_eq!(day["meta"]["pipelineVersion"], 1);
    assert!(day["meta"]["computedAt"].is_string());
    assert!(day["meta"]["latestCanonicalEventAt"].is_string());
    assert_eq!(day["dailyFacts"]["sleep"]["totalMinutes"], 450.0);
    assert!(day["intelligenceContext"].is_object());

    let resp =
      send(state, "GET", "/users/u1/daily-facts/2025-01-15", vec![], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn missing_documents_are_404_and_bad_dates_400() {
    let state = make_state(None).await;

    let resp =
      send(state.clone(), "GET", "/users/u1/daily-facts/2025-01-15", vec![], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["ok"], false);

    let resp = send(
      state.clone(),
      "GET",
      "/users/u1/intelligence-context/2025-01-15",
      vec![],
      Body::empty(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(state.clone(), "GET", "/users/u1/insights/2025-01-15", vec![], Body::empty()).await;
    assert_eq!(json_body(resp).await, json!([]));

    let resp = send(state, "GET", "/users/u1/days/15-01-2025", vec![], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Jobs ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recompute_job_reports_the_day() {
    let state = make_state(None).await;
    let body = json!({ "uid": "u1", "date": "2025-01-15" }).to_string();
    let resp = send(state, "POST", "/jobs/recompute", json_header(), body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      json_body(resp).await,
      json!({ "ok": true, "uid": "u1", "date": "2025-01-15" })
    );
  }

  #[tokio::test]
  async fn resync_setup_errors_are_400() {
    let state = make_state(None).await;

    let body = json!({ "uid": "u1", "provider": "fitbit" }).to_string();
    let resp = send(state.clone(), "POST", "/jobs/resync", json_header(), body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = json!({ "uid": "u1", "provider": "withings" }).to_string();
    let resp = send(state.clone(), "POST", "/jobs/resync", json_header(), body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json_body(resp).await;
    assert_eq!(err["ok"], false);
    assert!(err["error"].as_str().unwrap().contains("not configured"));

    let resp = send(state, "POST", "/jobs/resync", json_header(), "{}").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Webhook ────────────────────────────────────────────────────────────────

  fn notification() -> Vec<u8> {
    serde_json::to_vec(&json!({
      "event_type": "create",
      "data_type": "sleep",
      "object_id": "abc",
      "user_id": "ou-1",
      "event_time": "2025-01-16T07:00:00Z"
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn webhook_without_secret_is_400() {
    let state = make_state(None).await;
    let resp = send(state, "POST", "/webhooks/oura", vec![], notification()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn webhook_signature_is_enforced() {
    let state = make_state(Some(SECRET)).await;

    let resp = send(state.clone(), "POST", "/webhooks/oura", vec![], notification()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let wrong = webhook::sign("other", &notification()).unwrap();
    let resp = send(
      state,
      "POST",
      "/webhooks/oura",
      vec![(webhook::SIGNATURE_HEADER, wrong.as_str())],
      notification(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["ok"], false);
  }

  #[tokio::test]
  async fn signed_malformed_webhook_is_400() {
    let state = make_state(Some(SECRET)).await;
    let body = b"{not json".to_vec();
    let sig = webhook::sign(SECRET, &body).unwrap();
    let resp = send(
      state,
      "POST",
      "/webhooks/oura",
      vec![(webhook::SIGNATURE_HEADER, sig.as_str())],
      body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn webhook_is_recorded_once() {
    let state = make_state(Some(SECRET)).await;
    let sig = webhook::sign(SECRET, &notification()).unwrap();
    let headers = vec![(webhook::SIGNATURE_HEADER, sig.as_str())];

    let resp = send(state.clone(), "POST", "/webhooks/oura", headers.clone(), notification()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "ok": true, "eventId": "oura_abc_create" }));

    let resp = send(state, "POST", "/webhooks/oura", headers, notification()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      json_body(resp).await,
      json!({ "ok": true, "eventId": "oura_abc_create", "dedup": true })
    );
  }
}
