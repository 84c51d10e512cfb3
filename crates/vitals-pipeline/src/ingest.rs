//! [`Pipeline`]: ingestion and recomputation against a [`TruthStore`].
//!
//! Raw events are written create-only. A created raw event is mapped at once
//! and yields exactly one canonical event or one failure. A raw event whose
//! mapping never landed is mapped on its next delivery instead of being
//! treated as a duplicate. Derived documents are idempotent overwrites, so
//! concurrent recomputation of the same day is harmless.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use vitals_core::{
  event::{IngestEnvelope, RawEvent},
  facts::DailyFacts,
  failure::{Failure, FailureKind},
  store::{TruthStore, WriteOutcome},
};

use crate::{
  Error, PipelineConfig, Result,
  aggregate::aggregate_with_history,
  assemble::assemble,
  insights::{self, InsightWindow, rule_kinds, window_start},
  mapper::map_raw_event,
};

/// What happened to one ingested event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
  pub raw_event_id:       String,
  /// The raw event already existed; nothing new was canonicalised.
  pub dedup:              bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub canonical_event_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure_id:         Option<String>,
  /// The day the canonical event was bucketed to.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub day:                Option<NaiveDate>,
}

impl IngestOutcome {
  fn dedup(raw_event_id: &str, failure_id: Option<String>) -> Self {
    Self {
      raw_event_id: raw_event_id.to_owned(),
      dedup: true,
      canonical_event_id: None,
      failure_id,
      day: None,
    }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<S> {
  store:  Arc<S>,
  config: PipelineConfig,
}

impl<S> Clone for Pipeline<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: self.config.clone(),
    }
  }
}

impl<S: TruthStore> Pipeline<S> {
  pub fn new(store: Arc<S>, config: PipelineConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { store, config })
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  /// Ingest one envelope for `user_id`, recomputing its day when configured.
  #[tracing::instrument(skip(self, envelope), fields(provider = %envelope.provider, kind = %envelope.kind))]
  pub async fn ingest(
    &self,
    user_id: &str,
    envelope: IngestEnvelope,
    now: DateTime<Utc>,
  ) -> Result<IngestOutcome> {
    if user_id.trim().is_empty() {
      return Err(Error::InvalidEnvelope("user id must not be empty".into()));
    }
    if envelope.provider.trim().is_empty() {
      return Err(Error::InvalidEnvelope("provider must not be empty".into()));
    }
    if envelope.kind.trim().is_empty() {
      return Err(Error::InvalidEnvelope("kind must not be empty".into()));
    }

    let raw = envelope.into_raw_event(user_id, now);
    let written = self
      .store
      .create_raw_event(raw.clone())
      .await
      .map_err(Error::store)?;
    let outcome = self.settle(&raw, written, now).await?;

    // The event is stored either way; a failed recompute only leaves the day
    // stale until the next recompute.
    if self.config.recompute_on_ingest
      && let Some(day) = outcome.day
      && let Err(e) = self.recompute_day(user_id, day, now).await
    {
      warn!(%user_id, %day, "recompute after ingest failed: {e}");
    }
    Ok(outcome)
  }

  /// Ingest prepared raw events, each as its own create-only write. Outcomes
  /// line up with `events`. Recomputation is left to the caller.
  ///
  /// Every written event is settled even when an earlier one fails; the first
  /// error is returned, and a rerun maps whatever was left unsettled.
  pub async fn ingest_batch(
    &self,
    events: Vec<RawEvent>,
    now: DateTime<Utc>,
  ) -> Result<Vec<IngestOutcome>> {
    let written = self
      .store
      .create_raw_events(events.clone())
      .await
      .map_err(Error::store)?;

    let mut outcomes = Vec::with_capacity(events.len());
    let mut first_error = None;
    for (raw, written) in events.iter().zip(written) {
      match self.settle(raw, written, now).await {
        Ok(outcome) => outcomes.push(outcome),
        Err(e) => {
          warn!(user_id = %raw.user_id, raw_event_id = %raw.id, "raw event left unsettled: {e}");
          first_error.get_or_insert(e);
        }
      }
    }
    match first_error {
      Some(e) => Err(e),
      None => Ok(outcomes),
    }
  }

  /// Finish one raw event write: canonicalise it if it is new, otherwise
  /// check the duplicate against what is stored.
  async fn settle(
    &self,
    raw: &RawEvent,
    written: WriteOutcome,
    now: DateTime<Utc>,
  ) -> Result<IngestOutcome> {
    match written {
      WriteOutcome::Created => self.canonicalise(raw, now).await,
      WriteOutcome::AlreadyExists => self.deduplicate(raw, now).await,
    }
  }

  async fn deduplicate(&self, raw: &RawEvent, now: DateTime<Utc>) -> Result<IngestOutcome> {
    let stored = self
      .store
      .get_raw_event(&raw.user_id, &raw.id)
      .await
      .map_err(Error::store)?;
    let Some(stored) = stored else {
      return Ok(IngestOutcome::dedup(&raw.id, None));
    };
    let repaired = self.repair(&stored, now).await?;

    if stored.fingerprint == raw.fingerprint {
      return Ok(repaired.unwrap_or_else(|| {
        debug!(user_id = %raw.user_id, raw_event_id = %raw.id, "duplicate delivery ignored");
        IngestOutcome::dedup(&raw.id, None)
      }));
    }

    warn!(
      user_id = %raw.user_id,
      raw_event_id = %raw.id,
      "idempotency key reused for different content; keeping the original"
    );
    let failure = Failure {
      id:           Failure::id_for(FailureKind::DuplicateEvent, &raw.id, &raw.fingerprint),
      user_id:      raw.user_id.clone(),
      kind:         FailureKind::DuplicateEvent,
      raw_event_id: Some(raw.id.clone()),
      reason:       None,
      message:      "idempotency key reused with a different payload".into(),
      details:      Some(json!({
        "storedFingerprint":   stored.fingerprint,
        "incomingFingerprint": raw.fingerprint,
      })),
      created_at:   now,
    };
    let id = failure.id.clone();
    self.store.create_failure(failure).await.map_err(Error::store)?;

    let mut outcome = IngestOutcome::dedup(&raw.id, Some(id));
    if let Some(repaired) = repaired {
      outcome.canonical_event_id = repaired.canonical_event_id;
      outcome.day = repaired.day;
    }
    Ok(outcome)
  }

  /// Map a stored raw event whose canonical event or failure was never
  /// written. `None` when it is already settled.
  async fn repair(&self, stored: &RawEvent, now: DateTime<Utc>) -> Result<Option<IngestOutcome>> {
    let settled = self
      .store
      .is_raw_event_settled(&stored.user_id, &stored.id)
      .await
      .map_err(Error::store)?;
    if settled {
      return Ok(None);
    }
    info!(
      user_id = %stored.user_id,
      raw_event_id = %stored.id,
      "mapping a stored raw event that was never settled"
    );
    self.canonicalise(stored, now).await.map(Some)
  }

  async fn canonicalise(&self, raw: &RawEvent, now: DateTime<Utc>) -> Result<IngestOutcome> {
    match map_raw_event(raw, now) {
      Ok(event) => {
        let (id, day) = (event.id.clone(), event.day);
        self
          .store
          .create_canonical_event(event)
          .await
          .map_err(Error::store)?;
        debug!(user_id = %raw.user_id, raw_event_id = %raw.id, %day, "canonical event created");
        Ok(IngestOutcome {
          raw_event_id:       raw.id.clone(),
          dedup:              false,
          canonical_event_id: Some(id),
          failure_id:         None,
          day:                Some(day),
        })
      }
      Err(rejection) => {
        warn!(
          user_id = %raw.user_id,
          raw_event_id = %raw.id,
          reason = ?rejection.reason,
          "raw event rejected: {rejection}"
        );
        let failure = Failure {
          id:           Failure::id_for(FailureKind::RawEventInvalid, &raw.id, ""),
          user_id:      raw.user_id.clone(),
          kind:         FailureKind::RawEventInvalid,
          raw_event_id: Some(raw.id.clone()),
          reason:       Some(rejection.reason),
          message:      rejection.to_string(),
          details:      rejection.path.as_ref().map(|p| json!({ "path": p })),
          created_at:   now,
        };
        let id = failure.id.clone();
        self.store.create_failure(failure).await.map_err(Error::store)?;
        Ok(IngestOutcome {
          raw_event_id:       raw.id.clone(),
          dedup:              false,
          canonical_event_id: None,
          failure_id:         Some(id),
          day:                None,
        })
      }
    }
  }

  // ── Recomputation ─────────────────────────────────────────────────────────

  /// Recompute daily facts, insights and the intelligence context for one
  /// day. Returns `None` when the day has no events and no stored facts.
  #[tracing::instrument(skip(self))]
  pub async fn recompute_day(
    &self,
    user_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
  ) -> Result<Option<DailyFacts>> {
    let days = self.config.insight_window_days;
    let events = self
      .store
      .list_canonical_events(user_id, date)
      .await
      .map_err(Error::store)?;
    let history = self
      .store
      .list_daily_facts(user_id, window_start(date, days), date)
      .await
      .map_err(Error::store)?;

    let (existing, prior): (Vec<DailyFacts>, Vec<DailyFacts>) =
      history.into_iter().partition(|f| f.date == date);
    let existing = existing.into_iter().next();
    if events.is_empty() && existing.is_none() {
      debug!("nothing to recompute");
      return Ok(None);
    }

    let facts = aggregate_with_history(user_id, date, now, &events, &prior);
    let changed = existing.as_ref().is_none_or(|e| !e.same_facts_as(&facts));
    self
      .store
      .put_daily_facts(facts.clone())
      .await
      .map_err(Error::store)?;

    let window = InsightWindow::new(user_id, date, days, prior.into_iter().chain([facts.clone()]))?;
    let previous = self
      .store
      .list_insights(user_id, date)
      .await
      .map_err(Error::store)?;
    let insights = insights::evaluate(&window, now, &previous);
    let kinds = rule_kinds();
    self
      .store
      .replace_insights(user_id, date, &kinds, insights.clone())
      .await
      .map_err(Error::store)?;

    let context = assemble(
      user_id,
      date,
      now,
      Some(&facts),
      &insights,
      &self.config.context_policy(),
    );
    self
      .store
      .put_intelligence_context(context)
      .await
      .map_err(Error::store)?;

    info!(
      events = facts.meta.events_count,
      insights = insights.len(),
      changed,
      "day recomputed"
    );
    Ok(Some(facts))
  }

  /// Recompute today and yesterday (UTC) for every known user. One user's
  /// failure is logged and does not stop the others. Returns the number of
  /// days written.
  #[tracing::instrument(skip(self))]
  pub async fn recompute_recent(&self, now: DateTime<Utc>) -> Result<usize> {
    let users = self.store.list_user_ids().await.map_err(Error::store)?;
    let today = now.date_naive();
    let days = [today - Duration::days(1), today];

    let mut written = 0;
    for user_id in &users {
      for day in days {
        match self.recompute_day(user_id, day, now).await {
          Ok(Some(_)) => written += 1,
          Ok(None) => {}
          Err(e) => warn!(%user_id, %day, "recompute failed: {e}"),
        }
      }
    }
    info!(users = users.len(), written, "scheduled recompute finished");
    Ok(written)
  }
}
