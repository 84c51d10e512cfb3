//! An in-memory SQLite store whose writes can be made to fail on demand.

use std::{
  collections::HashSet,
  future::Future,
  sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::NaiveDate;
use thiserror::Error;
use vitals_core::{
  canonical::CanonicalEvent,
  context::IntelligenceContext,
  event::{RawEvent, WebhookReceipt},
  facts::DailyFacts,
  failure::Failure,
  insight::Insight,
  store::{TruthStore, WriteOutcome},
};
use vitals_store_sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum FaultError {
  #[error("injected write failure")]
  Injected,

  #[error(transparent)]
  Store(#[from] vitals_store_sqlite::Error),
}

pub struct FaultyStore {
  inner:             SqliteStore,
  failing_canonical: Mutex<HashSet<String>>,
  failing_facts:     AtomicBool,
}

impl FaultyStore {
  pub async fn new() -> Self {
    Self {
      inner:             SqliteStore::open_in_memory().await.unwrap(),
      failing_canonical: Mutex::new(HashSet::new()),
      failing_facts:     AtomicBool::new(false),
    }
  }

  /// Fail the canonical event write for `raw_event_id`.
  pub fn fail_canonical(&self, raw_event_id: &str) {
    self.failing_canonical.lock().unwrap().insert(raw_event_id.to_owned());
  }

  pub fn fail_daily_facts(&self) { self.failing_facts.store(true, Ordering::SeqCst); }

  pub fn heal(&self) {
    self.failing_canonical.lock().unwrap().clear();
    self.failing_facts.store(false, Ordering::SeqCst);
  }
}

impl TruthStore for FaultyStore {
  type Error = FaultError;

  fn create_raw_event(
    &self,
    event: RawEvent,
  ) -> impl Future<Output = Result<WriteOutcome, FaultError>> + Send + '_ {
    async move { Ok(self.inner.create_raw_event(event).await?) }
  }

  fn create_raw_events(
    &self,
    events: Vec<RawEvent>,
  ) -> impl Future<Output = Result<Vec<WriteOutcome>, FaultError>> + Send + '_ {
    async move { Ok(self.inner.create_raw_events(events).await?) }
  }

  fn get_raw_event<'a>(
    &'a self,
    user_id: &'a str,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<RawEvent>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.get_raw_event(user_id, id).await?) }
  }

  fn is_raw_event_settled<'a>(
    &'a self,
    user_id: &'a str,
    raw_event_id: &'a str,
  ) -> impl Future<Output = Result<bool, FaultError>> + Send + 'a {
    async move { Ok(self.inner.is_raw_event_settled(user_id, raw_event_id).await?) }
  }

  fn create_canonical_event(
    &self,
    event: CanonicalEvent,
  ) -> impl Future<Output = Result<WriteOutcome, FaultError>> + Send + '_ {
    let fail = self.failing_canonical.lock().unwrap().contains(&event.id);
    async move {
      if fail {
        return Err(FaultError::Injected);
      }
      Ok(self.inner.create_canonical_event(event).await?)
    }
  }

  fn list_canonical_events<'a>(
    &'a self,
    user_id: &'a str,
    day: NaiveDate,
  ) -> impl Future<Output = Result<Vec<CanonicalEvent>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.list_canonical_events(user_id, day).await?) }
  }

  fn create_failure(
    &self,
    failure: Failure,
  ) -> impl Future<Output = Result<WriteOutcome, FaultError>> + Send + '_ {
    async move { Ok(self.inner.create_failure(failure).await?) }
  }

  fn list_failures<'a>(
    &'a self,
    user_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Failure>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.list_failures(user_id, limit).await?) }
  }

  fn create_webhook_receipt(
    &self,
    receipt: WebhookReceipt,
  ) -> impl Future<Output = Result<WriteOutcome, FaultError>> + Send + '_ {
    async move { Ok(self.inner.create_webhook_receipt(receipt).await?) }
  }

  fn put_daily_facts(
    &self,
    facts: DailyFacts,
  ) -> impl Future<Output = Result<(), FaultError>> + Send + '_ {
    let fail = self.failing_facts.load(Ordering::SeqCst);
    async move {
      if fail {
        return Err(FaultError::Injected);
      }
      Ok(self.inner.put_daily_facts(facts).await?)
    }
  }

  fn get_daily_facts<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<DailyFacts>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.get_daily_facts(user_id, date).await?) }
  }

  fn list_daily_facts<'a>(
    &'a self,
    user_id: &'a str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DailyFacts>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.list_daily_facts(user_id, from, to).await?) }
  }

  fn replace_insights<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
    kinds: &'a [&'a str],
    insights: Vec<Insight>,
  ) -> impl Future<Output = Result<(), FaultError>> + Send + 'a {
    async move { Ok(self.inner.replace_insights(user_id, date, kinds, insights).await?) }
  }

  fn list_insights<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Insight>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.list_insights(user_id, date).await?) }
  }

  fn put_intelligence_context(
    &self,
    context: IntelligenceContext,
  ) -> impl Future<Output = Result<(), FaultError>> + Send + '_ {
    async move { Ok(self.inner.put_intelligence_context(context).await?) }
  }

  fn get_intelligence_context<'a>(
    &'a self,
    user_id: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<IntelligenceContext>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.get_intelligence_context(user_id, date).await?) }
  }

  fn list_user_ids(&self) -> impl Future<Output = Result<Vec<String>, FaultError>> + Send + '_ {
    async move { Ok(self.inner.list_user_ids().await?) }
  }

  fn access_token<'a>(
    &'a self,
    user_id: &'a str,
    provider: &'a str,
  ) -> impl Future<Output = Result<Option<String>, FaultError>> + Send + 'a {
    async move { Ok(self.inner.access_token(user_id, provider).await?) }
  }

  fn put_access_token<'a>(
    &'a self,
    user_id: &'a str,
    provider: &'a str,
    token: &'a str,
  ) -> impl Future<Output = Result<(), FaultError>> + Send + 'a {
    async move { Ok(self.inner.put_access_token(user_id, provider, token).await?) }
  }
}
