//! The provider resync job: pull recent history from a provider and feed it
//! through the same create-only ingestion path as live events.
//!
//! Fetching finishes before anything is written, so a provider failure leaves
//! the store untouched. Writes then go in bounded chunks, one create-only
//! write per raw event, and a rerun over the same history writes nothing new.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};
use vitals_core::{
  event::{IngestEnvelope, Provider, RawEvent},
  store::TruthStore,
};
use vitals_pipeline::Pipeline;

use crate::{
  Error, Result,
  config::{ProvidersConfig, ResyncConfig},
  http,
  oura::OuraClient,
  withings::WithingsClient,
};

/// Tally of one resync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncReport {
  pub provider:      Provider,
  pub uid:           String,
  /// Normalised items returned by the provider.
  pub fetched:       usize,
  /// Raw events created or first mapped by this run, rejected ones included.
  pub written:       usize,
  /// Items whose raw event already existed.
  pub deduplicated:  usize,
  /// Created raw events the mapper rejected (recorded as failures).
  pub rejected:      usize,
  pub affected_days: BTreeSet<NaiveDate>,
}

impl ResyncReport {
  fn new(provider: Provider, uid: &str, fetched: usize) -> Self {
    Self {
      provider,
      uid: uid.to_owned(),
      fetched,
      written: 0,
      deduplicated: 0,
      rejected: 0,
      affected_days: BTreeSet::new(),
    }
  }
}

pub struct Resync<S> {
  pipeline:  Pipeline<S>,
  providers: ProvidersConfig,
  config:    ResyncConfig,
  http:      Client,
}

impl<S> Clone for Resync<S> {
  fn clone(&self) -> Self {
    Self {
      pipeline:  self.pipeline.clone(),
      providers: self.providers.clone(),
      config:    self.config.clone(),
      http:      self.http.clone(),
    }
  }
}

impl<S: TruthStore> Resync<S> {
  pub fn new(
    pipeline: Pipeline<S>,
    providers: ProvidersConfig,
    config: ResyncConfig,
  ) -> Result<Self> {
    Ok(Self { pipeline, providers, config, http: http::client()? })
  }

  pub fn providers(&self) -> &ProvidersConfig { &self.providers }

  /// Resync the last `days` days (ending on `now`'s UTC date) of `provider`
  /// history for `uid`.
  #[tracing::instrument(skip(self, now))]
  pub async fn run(
    &self,
    uid: &str,
    provider: &str,
    now: DateTime<Utc>,
  ) -> Result<ResyncReport> {
    if uid.trim().is_empty() {
      return Err(Error::InvalidRequest("uid must not be empty".into()));
    }
    let provider = match provider.parse::<Provider>() {
      Ok(p @ (Provider::Oura | Provider::Withings)) => p,
      _ => return Err(Error::UnsupportedProvider(provider.to_owned())),
    };

    let end = now.date_naive();
    let start = end - Duration::days(i64::from(self.config.days.saturating_sub(1)));
    let envelopes = self.fetch(provider, uid, start, end).await?;

    let raw: Vec<RawEvent> = envelopes
      .into_iter()
      .map(|e| e.into_raw_event(uid, now))
      .collect();
    let mut report = ResyncReport::new(provider, uid, raw.len());

    for chunk in raw.chunks(self.config.chunk_size.max(1)) {
      let outcomes = self.pipeline.ingest_batch(chunk.to_vec(), now).await?;
      for outcome in outcomes {
        if let Some(day) = outcome.day {
          report.affected_days.insert(day);
        }
        if outcome.dedup {
          report.deduplicated += 1;
          continue;
        }
        report.written += 1;
        if outcome.failure_id.is_some() {
          report.rejected += 1;
        }
      }
    }

    if self.pipeline.config().recompute_on_ingest {
      for day in &report.affected_days {
        self.pipeline.recompute_day(uid, *day, now).await?;
      }
    }

    if report.rejected > 0 {
      warn!(rejected = report.rejected, "resync produced rejected events");
    }
    info!(
      fetched = report.fetched,
      written = report.written,
      deduplicated = report.deduplicated,
      days = report.affected_days.len(),
      "resync finished"
    );
    Ok(report)
  }

  async fn fetch(
    &self,
    provider: Provider,
    uid: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<IngestEnvelope>> {
    match provider {
      Provider::Oura => {
        let cfg = self.providers.oura.as_ref().ok_or(Error::NotConfigured(provider))?;
        let token = self.access_token(uid, provider).await?;
        OuraClient::new(self.http.clone(), &cfg.api_base)
          .fetch(&token, start, end)
          .await
      }
      Provider::Withings => {
        let cfg = self.providers.withings.as_ref().ok_or(Error::NotConfigured(provider))?;
        let token = self.access_token(uid, provider).await?;
        WithingsClient::new(self.http.clone(), &cfg.api_base)
          .fetch(&token, start, end)
          .await
      }
      Provider::Manual => Err(Error::UnsupportedProvider(provider.to_string())),
    }
  }

  async fn access_token(&self, uid: &str, provider: Provider) -> Result<String> {
    self
      .pipeline
      .store()
      .access_token(uid, provider.as_ref())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::MissingAccessToken { provider, user_id: uid.to_owned() })
  }
}
