//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use vitals_core::{
  canonical::{CanonicalBody, CanonicalEvent, StepsFields},
  context::{ContextFacts, ContextReadiness, InsightRollup, IntelligenceContext},
  event::{IngestEnvelope, OccurredAt, Provider, RawEvent, UncertaintyState, WebhookReceipt},
  facts::{ActivityFacts, DailyFacts, FactsMeta},
  failure::{Failure, FailureKind, RejectionReason},
  insight::{Insight, Severity},
  store::{TruthStore, WriteOutcome},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
}

fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 1, 15).unwrap() }

fn raw(user: &str, key: &str, steps: u64) -> RawEvent {
  IngestEnvelope {
    provider:                   "manual".into(),
    kind:                       "steps".into(),
    occurred_at:                OccurredAt::Instant(at(12, 0)),
    time_zone:                  None,
    payload:                    json!({ "steps": steps }),
    provenance:                 None,
    correction_of_raw_event_id: None,
    uncertainty_state:          None,
    idempotency_key:            Some(key.into()),
    schema_version:             None,
  }
  .into_raw_event(user, at(12, 5))
}

fn canonical(user: &str, id: &str, start: DateTime<Utc>) -> CanonicalEvent {
  CanonicalEvent {
    id:                         id.into(),
    user_id:                    user.into(),
    source_id:                  "manual".into(),
    start,
    end:                        start,
    day:                        day(),
    timezone:                   "UTC".into(),
    schema_version:             1,
    uncertainty_state:          UncertaintyState::Measured,
    correction_of_raw_event_id: None,
    created_at:                 at(23, 0),
    body:                       CanonicalBody::Steps(StepsFields {
      steps:       1000,
      distance_km: None,
    }),
  }
}

fn facts(user: &str, date: NaiveDate, steps: u64) -> DailyFacts {
  DailyFacts {
    user_id: user.into(),
    date,
    schema_version: 1,
    sleep: None,
    activity: Some(ActivityFacts { steps: Some(steps), ..Default::default() }),
    body: None,
    recovery: None,
    nutrition: None,
    strength: None,
    confidence: BTreeMap::new(),
    meta: FactsMeta { events_count: 1, ..Default::default() },
    computed_at: at(23, 30),
    pipeline_version: 1,
  }
}

fn insight(user: &str, kind: &str) -> Insight {
  Insight {
    id:             Insight::id_for(day(), kind),
    user_id:        user.into(),
    date:           day(),
    kind:           kind.into(),
    severity:       Severity::Info,
    title:          kind.into(),
    message:        "m".into(),
    evidence:       vec![],
    tags:           vec![],
    rule_version:   "insights-v1".into(),
    schema_version: 1,
    created_at:     at(23, 30),
    updated_at:     at(23, 30),
  }
}

fn failure(user: &str, raw_id: &str, created_at: DateTime<Utc>) -> Failure {
  Failure {
    id: Failure::id_for(FailureKind::RawEventInvalid, raw_id, ""),
    user_id: user.into(),
    kind: FailureKind::RawEventInvalid,
    raw_event_id: Some(raw_id.into()),
    reason: Some(RejectionReason::MalformedPayload),
    message: "bad".into(),
    details: None,
    created_at,
  }
}

// ─── Raw events ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn raw_event_create_is_create_only() {
  let s = store().await;
  let first = raw("u1", "k1", 100);

  assert_eq!(s.create_raw_event(first.clone()).await.unwrap(), WriteOutcome::Created);

  // Same key, different payload: the original must survive untouched.
  let second = raw("u1", "k1", 999);
  assert_eq!(
    s.create_raw_event(second).await.unwrap(),
    WriteOutcome::AlreadyExists
  );

  let stored = s.get_raw_event("u1", &first.id).await.unwrap().unwrap();
  assert_eq!(stored, first);
}

#[tokio::test]
async fn raw_events_are_scoped_per_user() {
  let s = store().await;
  let a = raw("u1", "k1", 100);
  let b = raw("u2", "k1", 100);
  assert_eq!(a.id, b.id);

  assert!(s.create_raw_event(a).await.unwrap().is_created());
  assert!(s.create_raw_event(b).await.unwrap().is_created());
  assert_eq!(s.list_user_ids().await.unwrap(), vec!["u1", "u2"]);
}

#[tokio::test]
async fn batch_create_reports_per_item_outcomes() {
  let s = store().await;
  s.create_raw_event(raw("u1", "k2", 1)).await.unwrap();

  let outcomes = s
    .create_raw_events(vec![raw("u1", "k1", 1), raw("u1", "k2", 1), raw("u1", "k3", 1)])
    .await
    .unwrap();
  assert_eq!(outcomes, vec![
    WriteOutcome::Created,
    WriteOutcome::AlreadyExists,
    WriteOutcome::Created,
  ]);

  let again = s
    .create_raw_events(vec![raw("u1", "k1", 1), raw("u1", "k3", 1)])
    .await
    .unwrap();
  assert!(again.iter().all(|o| *o == WriteOutcome::AlreadyExists));
}

#[tokio::test]
async fn get_raw_event_missing_returns_none() {
  let s = store().await;
  assert!(s.get_raw_event("u1", "manual_nope").await.unwrap().is_none());
}

#[tokio::test]
async fn raw_event_is_settled_by_its_canonical_event_or_rejection() {
  let s = store().await;
  for key in ["k1", "k2", "k3"] {
    s.create_raw_event(raw("u1", key, 10)).await.unwrap();
  }
  assert!(!s.is_raw_event_settled("u1", "manual_k1").await.unwrap());

  s.create_canonical_event(canonical("u1", "manual_k1", at(12, 0))).await.unwrap();
  s.create_failure(failure("u1", "manual_k2", at(12, 1))).await.unwrap();

  let mut duplicate = failure("u1", "manual_k3", at(12, 2));
  duplicate.kind = FailureKind::DuplicateEvent;
  duplicate.id = Failure::id_for(FailureKind::DuplicateEvent, "manual_k3", "x");
  s.create_failure(duplicate).await.unwrap();

  assert!(s.is_raw_event_settled("u1", "manual_k1").await.unwrap());
  assert!(s.is_raw_event_settled("u1", "manual_k2").await.unwrap());
  assert!(!s.is_raw_event_settled("u1", "manual_k3").await.unwrap());
  assert!(!s.is_raw_event_settled("u2", "manual_k1").await.unwrap());
}

// ─── Canonical events ────────────────────────────────────────────────────────

#[tokio::test]
async fn canonical_events_list_by_day_in_start_order() {
  let s = store().await;
  s.create_canonical_event(canonical("u1", "manual_b", at(9, 0))).await.unwrap();
  s.create_canonical_event(canonical("u1", "manual_a", at(9, 0))).await.unwrap();
  s.create_canonical_event(canonical("u1", "manual_c", at(7, 0))).await.unwrap();
  s.create_canonical_event(canonical("u2", "manual_d", at(8, 0))).await.unwrap();

  let ids: Vec<String> = s
    .list_canonical_events("u1", day())
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.id)
    .collect();
  assert_eq!(ids, vec!["manual_c", "manual_a", "manual_b"]);

  let other_day = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap();
  assert!(s.list_canonical_events("u1", other_day).await.unwrap().is_empty());
}

#[tokio::test]
async fn canonical_event_is_never_overwritten() {
  let s = store().await;
  let first = canonical("u1", "manual_a", at(9, 0));
  assert!(s.create_canonical_event(first.clone()).await.unwrap().is_created());

  let mut changed = first.clone();
  changed.start = at(10, 0);
  assert_eq!(
    s.create_canonical_event(changed).await.unwrap(),
    WriteOutcome::AlreadyExists
  );

  let stored = s.list_canonical_events("u1", day()).await.unwrap();
  assert_eq!(stored, vec![first]);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failures_are_deduplicated_and_listed_newest_first() {
  let s = store().await;
  let older = failure("u1", "manual_a", at(8, 0));
  let newer = failure("u1", "manual_b", at(9, 0));

  assert!(s.create_failure(older.clone()).await.unwrap().is_created());
  assert!(s.create_failure(newer.clone()).await.unwrap().is_created());
  assert_eq!(
    s.create_failure(older.clone()).await.unwrap(),
    WriteOutcome::AlreadyExists
  );

  let listed = s.list_failures("u1", 10).await.unwrap();
  assert_eq!(listed, vec![newer.clone(), older]);

  let limited = s.list_failures("u1", 1).await.unwrap();
  assert_eq!(limited, vec![newer]);
  assert!(s.list_failures("u2", 10).await.unwrap().is_empty());
}

// ─── Webhook receipts ────────────────────────────────────────────────────────

#[tokio::test]
async fn webhook_receipt_is_create_only() {
  let s = store().await;
  let receipt = WebhookReceipt {
    id:               "oura_abc_create".into(),
    provider:         Provider::Oura,
    provider_user_id: Some("ou-1".into()),
    event_type:       Some("create".into()),
    data_type:        Some("sleep".into()),
    body:             json!({ "object_id": "abc" }),
    received_at:      at(10, 0),
  };

  assert!(s.create_webhook_receipt(receipt.clone()).await.unwrap().is_created());
  assert_eq!(
    s.create_webhook_receipt(receipt).await.unwrap(),
    WriteOutcome::AlreadyExists
  );
}

// ─── Daily facts ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn daily_facts_put_overwrites_idempotently() {
  let s = store().await;
  assert!(s.get_daily_facts("u1", day()).await.unwrap().is_none());

  s.put_daily_facts(facts("u1", day(), 1000)).await.unwrap();
  s.put_daily_facts(facts("u1", day(), 2000)).await.unwrap();

  let got = s.get_daily_facts("u1", day()).await.unwrap().unwrap();
  assert_eq!(got.activity.unwrap().steps, Some(2000));
}

#[tokio::test]
async fn daily_facts_range_is_inclusive_and_ascending() {
  let s = store().await;
  for d in [14, 12, 15, 10] {
    let date = NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
    s.put_daily_facts(facts("u1", date, u64::from(d))).await.unwrap();
  }

  let from = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
  let dates: Vec<NaiveDate> = s
    .list_daily_facts("u1", from, day())
    .await
    .unwrap()
    .into_iter()
    .map(|f| f.date)
    .collect();
  assert_eq!(dates, vec![
    NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
    NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
    day(),
  ]);
}

// ─── Insights ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_insights_replaces_only_listed_kinds() {
  let s = store().await;
  s.replace_insights("u1", day(), &["sleep_debt", "low_activity"], vec![
    insight("u1", "sleep_debt"),
    insight("u1", "low_activity"),
  ])
  .await
  .unwrap();
  s.replace_insights("u1", day(), &["other_rule"], vec![insight("u1", "other_rule")])
    .await
    .unwrap();

  // low_activity stopped firing; other_rule is outside this rule set.
  s.replace_insights("u1", day(), &["sleep_debt", "low_activity"], vec![insight(
    "u1",
    "sleep_debt",
  )])
  .await
  .unwrap();

  let kinds: Vec<String> = s
    .list_insights("u1", day())
    .await
    .unwrap()
    .into_iter()
    .map(|i| i.kind)
    .collect();
  assert_eq!(kinds, vec!["other_rule", "sleep_debt"]);
}

// ─── Intelligence context ────────────────────────────────────────────────────

#[tokio::test]
async fn intelligence_context_round_trips() {
  let s = store().await;
  let ctx = IntelligenceContext {
    user_id:          "u1".into(),
    date:             day(),
    schema_version:   1,
    facts:            ContextFacts { steps: Some(1000), ..Default::default() },
    insights:         InsightRollup::default(),
    readiness:        ContextReadiness {
      has_daily_facts: true,
      ..Default::default()
    },
    confidence:       None,
    computed_at:      at(23, 30),
    pipeline_version: 1,
  };

  s.put_intelligence_context(ctx.clone()).await.unwrap();
  s.put_intelligence_context(ctx.clone()).await.unwrap();
  assert_eq!(s.get_intelligence_context("u1", day()).await.unwrap(), Some(ctx));
  assert!(s.get_intelligence_context("u2", day()).await.unwrap().is_none());
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn access_tokens_upsert() {
  let s = store().await;
  assert!(s.access_token("u1", "oura").await.unwrap().is_none());

  s.put_access_token("u1", "oura", "t1").await.unwrap();
  s.put_access_token("u1", "oura", "t2").await.unwrap();
  assert_eq!(s.access_token("u1", "oura").await.unwrap().as_deref(), Some("t2"));
  assert!(s.access_token("u1", "withings").await.unwrap().is_none());
}
