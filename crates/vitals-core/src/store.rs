//! The `TruthStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `vitals-store-sqlite`).
//! Higher layers (`vitals-pipeline`, `vitals-api`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Every collection is scoped to a user. Append-only collections (raw events,
//! canonical events, failures, webhook receipts) expose only create-only
//! writes and reads: there is no update or delete in this surface. Derived
//! collections (daily facts, insights, intelligence context) expose
//! idempotent overwrites, since they are pure functions of their inputs.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  canonical::CanonicalEvent,
  context::IntelligenceContext,
  event::{RawEvent, WebhookReceipt},
  facts::DailyFacts,
  failure::Failure,
  insight::Insight,
};

/// Result of a create-don't-overwrite write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Created,
  /// A record with the same key was already present; nothing was written.
  AlreadyExists,
}

impl WriteOutcome {
  pub fn is_created(self) -> bool { matches!(self, Self::Created) }
}

/// Abstraction over a storage backend for the truth pipeline.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TruthStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Raw events (append-only) ─────────────────────────────────────────

  /// Insert `event` unless a raw event with the same `(user_id, id)` exists.
  fn create_raw_event(
    &self,
    event: RawEvent,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  /// Insert each event as its own atomic write. A failure part-way leaves the
  /// earlier writes committed; the returned outcomes line up with `events`.
  fn create_raw_events(
    &self,
    events: Vec<RawEvent>,
  ) -> impl Future<Output = Result<Vec<WriteOutcome>, Self::Error>> + Send + '_;

  fn get_raw_event<'a>(
    &'a self,
    user_id: &'a str,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<RawEvent>, Self::Error>> + Send + 'a;

  /// True once the raw event has been mapped: its canonical event exists, or
  /// a `RAW_EVENT_INVALID` failure names it.
  fn is_raw_event_settled<'a>(
    &'a self,
    user_id: &'a str,
    raw_event_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Canonical events (append-only) ───────────────────────────────────

  fn create_canonical_event(
    &self,
    event: CanonicalEvent,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  /// All canonical events bucketed to `day`, ordered by `(start, id)`.
  fn list_canonical_events<'a>(
    &'a self,
    user_id: &'a str,
    day: NaiveDate,
  ) -> impl Future<Output = Result<Vec<CanonicalEvent>, Self::Error>> + Send + 'a;

  // ── Failures (append-only) ───────────────────────────────────────────

  fn create_failure(
    &self,
    failure: Failure,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  /// Most recent failures first.
  fn list_failures<'a>(
    &'a self,
    user_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Failure>, Self::Error>> + Send + 'a;

  // ── Webhook receipts (append-only) ───────────────────────────────────

  fn create_webhook_receipt(
    &self,
    receipt: WebhookReceipt,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  // ── Derived documents (idempotent overwrite) ─────────────────────────

  fn put_daily_facts(
    &self,
    facts: DailyFacts,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_daily_facts<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<DailyFacts>, Self::Error>> + Send + 'a;

  /// Daily facts with `from <= date <= to`, ascending by date.
  fn list_daily_facts<'a>(
    &'a self,
    user_id: &'a str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DailyFacts>, Self::Error>> + Send + 'a;

  /// Replace the insights of every kind in `kinds` for `(user_id, date)` with
  /// `insights`. Kinds outside `kinds` are left untouched.
  fn replace_insights<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
    kinds: &'a [&'a str],
    insights: Vec<Insight>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Insights for a day, ordered by kind.
  fn list_insights<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Insight>, Self::Error>> + Send + 'a;

  fn put_intelligence_context(
    &self,
    context: IntelligenceContext,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_intelligence_context<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<IntelligenceContext>, Self::Error>>
  + Send
  + 'a;

  // ── Users and integrations ────────────────────────────────────────────

  /// Every user with at least one raw event.
  fn list_user_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// The stored provider access token for a user, if any. Obtaining tokens
  /// (the OAuth handshake) happens outside the pipeline.
  fn access_token<'a>(
    &'a self,
    user_id: &'a str,
    provider: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn put_access_token<'a>(
    &'a self,
    user_id: &'a str,
    provider: &'a str,
    token: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
