//! Resync against mocked provider APIs.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use vitals_core::store::TruthStore;
use vitals_pipeline::{Pipeline, PipelineConfig};
use vitals_providers::{
  Error, OuraConfig, ProvidersConfig, Resync, ResyncConfig, WithingsConfig,
};
use vitals_store_sqlite::SqliteStore;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{body_string_contains, header, method, path, query_param},
};

const UID: &str = "u1";

fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 1, 16, 12, 0, 0).unwrap() }

async fn store_with_token(provider: &str) -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  store.put_access_token(UID, provider, "tok").await.unwrap();
  Arc::new(store)
}

fn resync(
  store: Arc<SqliteStore>,
  providers: ProvidersConfig,
  chunk_size: usize,
) -> Resync<SqliteStore> {
  let pipeline = Pipeline::new(store, PipelineConfig::default()).unwrap();
  Resync::new(pipeline, providers, ResyncConfig { days: 30, chunk_size }).unwrap()
}

fn oura_at(server: &MockServer) -> ProvidersConfig {
  ProvidersConfig {
    oura:     Some(OuraConfig { api_base: server.uri(), webhook_secret: None }),
    withings: None,
  }
}

fn page(data: Value) -> ResponseTemplate {
  ResponseTemplate::new(200).set_body_json(json!({ "data": data, "next_token": null }))
}

async fn mount_oura(server: &MockServer, sleep: Value, activity: Value, workout: Value) {
  for (name, data) in [("sleep", sleep), ("daily_activity", activity), ("workout", workout)] {
    Mock::given(method("GET"))
      .and(path(format!("/v2/usercollection/{name}")))
      .and(header("authorization", "Bearer tok"))
      .respond_with(page(data))
      .mount(server)
      .await;
  }
}

fn sleep_docs() -> Value {
  json!([
    {
      "id": "s1",
      "bedtime_start": "2025-01-14T23:00:00+00:00",
      "bedtime_end": "2025-01-15T07:00:00+00:00",
      "type": "long_sleep",
      "total_sleep_duration": 27000,
      "average_hrv": 48
    },
    {
      "id": "s2",
      "bedtime_start": "2025-01-15T14:00:00+00:00",
      "bedtime_end": "2025-01-15T14:40:00+00:00",
      "type": "sleep"
    }
  ])
}

#[tokio::test]
async fn oura_items_are_written_once() {
  let server = MockServer::start().await;
  mount_oura(
    &server,
    sleep_docs(),
    json!([{ "id": "a1", "day": "2025-01-15", "steps": 9000, "equivalent_walking_distance": 7000 }]),
    json!([{
      "id": "w1",
      "activity": "cycling",
      "start_datetime": "2025-01-15T17:00:00+00:00",
      "end_datetime": "2025-01-15T18:00:00+00:00",
      "calories": 450
    }]),
  )
  .await;

  let store = store_with_token("oura").await;
  // A chunk size of 2 forces several write batches.
  let job = resync(Arc::clone(&store), oura_at(&server), 2);

  let first = job.run(UID, "oura", now()).await.unwrap();
  assert_eq!(first.fetched, 5);
  assert_eq!(first.written, 5);
  assert_eq!(first.deduplicated, 0);
  assert_eq!(first.rejected, 0);
  let day = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
  assert!(first.affected_days.contains(&day));

  for id in ["oura_s1", "oura_s1-hrv", "oura_s2", "oura_a1", "oura_w1"] {
    assert!(store.get_raw_event(UID, id).await.unwrap().is_some(), "{id}");
  }
  let facts = store.get_daily_facts(UID, day).await.unwrap().unwrap();
  assert_eq!(facts.activity.unwrap().steps, Some(9000));

  let second = job.run(UID, "oura", now() + chrono::Duration::minutes(5)).await.unwrap();
  assert_eq!(second.fetched, 5);
  assert_eq!(second.written, 0);
  assert_eq!(second.deduplicated, 5);
  assert!(second.affected_days.is_empty());
  assert!(store.list_failures(UID, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn oura_pages_are_followed() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v2/usercollection/sleep"))
    .and(query_param("next_token", "p2"))
    .respond_with(page(json!([{
      "id": "s3",
      "bedtime_start": "2025-01-13T23:00:00+00:00",
      "bedtime_end": "2025-01-14T06:00:00+00:00",
      "type": "long_sleep"
    }])))
    .with_priority(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v2/usercollection/sleep"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({ "data": sleep_docs(), "next_token": "p2" })),
    )
    .mount(&server)
    .await;
  for name in ["daily_activity", "workout"] {
    Mock::given(method("GET"))
      .and(path(format!("/v2/usercollection/{name}")))
      .respond_with(page(json!([])))
      .mount(&server)
      .await;
  }

  let store = store_with_token("oura").await;
  let report = resync(Arc::clone(&store), oura_at(&server), 450)
    .run(UID, "oura", now())
    .await
    .unwrap();

  assert_eq!(report.fetched, 4);
  assert!(store.get_raw_event(UID, "oura_s3").await.unwrap().is_some());
}

#[tokio::test]
async fn withings_measure_groups_become_weight_events() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/measure"))
    .and(body_string_contains("action=getmeas"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "status": 0,
      "body": {
        "timezone": "Europe/Paris",
        "more": 0,
        "offset": 0,
        "measuregrps": [
          { "grpid": 101, "date": 1736928000, "measures": [
            { "value": 80150, "type": 1, "unit": -3 },
            { "value": 215, "type": 6, "unit": -1 }
          ]},
          { "grpid": 102, "date": 1737014400, "measures": [
            { "value": 7990, "type": 1, "unit": -2 }
          ]}
        ]
      }
    })))
    .mount(&server)
    .await;

  let store = store_with_token("withings").await;
  let providers = ProvidersConfig {
    oura:     None,
    withings: Some(WithingsConfig { api_base: server.uri() }),
  };
  let report = resync(Arc::clone(&store), providers, 450)
    .run(UID, "withings", now())
    .await
    .unwrap();

  assert_eq!(report.written, 2);
  let raw = store.get_raw_event(UID, "withings_101").await.unwrap().unwrap();
  assert_eq!(raw.kind, "weight");
  let fat = raw.payload["bodyFatPercent"].as_f64().unwrap();
  assert!((fat - 21.5).abs() < 1e-9);
}

#[tokio::test]
async fn withings_error_status_aborts() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/measure"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({ "status": 401, "error": "invalid_token" })),
    )
    .mount(&server)
    .await;

  let store = store_with_token("withings").await;
  let providers = ProvidersConfig {
    oura:     None,
    withings: Some(WithingsConfig { api_base: server.uri() }),
  };
  let err = resync(store, providers, 450).run(UID, "withings", now()).await.unwrap_err();
  assert!(matches!(err, Error::ProviderResponse { .. }));
  assert!(!err.is_client_error());
}

#[tokio::test]
async fn provider_failure_writes_nothing() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v2/usercollection/sleep"))
    .respond_with(page(sleep_docs()))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v2/usercollection/daily_activity"))
    .respond_with(page(json!([])))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v2/usercollection/workout"))
    .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
    .mount(&server)
    .await;

  let store = store_with_token("oura").await;
  let err = resync(Arc::clone(&store), oura_at(&server), 450)
    .run(UID, "oura", now())
    .await
    .unwrap_err();

  assert!(matches!(err, Error::ProviderStatus { status: 500, .. }));
  assert!(!err.is_client_error());
  assert!(store.get_raw_event(UID, "oura_s1").await.unwrap().is_none());
}

#[tokio::test]
async fn setup_problems_are_client_errors() {
  let server = MockServer::start().await;

  // Not configured.
  let store = store_with_token("oura").await;
  let err = resync(Arc::clone(&store), ProvidersConfig::default(), 450)
    .run(UID, "oura", now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotConfigured(_)));
  assert!(err.is_client_error());

  // Configured, but no token for this user.
  let err = resync(Arc::clone(&store), oura_at(&server), 450)
    .run("someone-else", "oura", now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MissingAccessToken { .. }));
  assert!(err.is_client_error());

  for provider in ["fitbit", "manual", ""] {
    let err = resync(Arc::clone(&store), oura_at(&server), 450)
      .run(UID, provider, now())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::UnsupportedProvider(_)), "{provider}");
  }

  assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
