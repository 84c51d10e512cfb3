//! Read-only derived truth, per `(uid, date)`.
//!
//! | Method | Path |
//! |--------|------|
//! | `GET`  | `/users/{uid}/daily-facts/{date}` |
//! | `GET`  | `/users/{uid}/insights/{date}` |
//! | `GET`  | `/users/{uid}/intelligence-context/{date}` |
//! | `GET`  | `/users/{uid}/days/{date}` |
//! | `GET`  | `/users/{uid}/failures` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use vitals_core::{
  context::IntelligenceContext, day::DayTruth, facts::DailyFacts, facts::parse_day,
  failure::Failure, insight::Insight, store::TruthStore,
};

use crate::{AppState, error::ApiError};

const DEFAULT_FAILURE_LIMIT: usize = 50;
const MAX_FAILURE_LIMIT: usize = 500;

fn day_path(date: &str) -> Result<NaiveDate, ApiError> {
  parse_day(date).map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub async fn daily_facts<S>(
  State(state): State<AppState<S>>,
  Path((uid, date)): Path<(String, String)>,
) -> Result<Json<DailyFacts>, ApiError>
where
  S: TruthStore + 'static,
{
  let date = day_path(&date)?;
  let facts = state
    .pipeline
    .store()
    .get_daily_facts(&uid, date)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no daily facts for {uid} on {date}")))?;
  Ok(Json(facts))
}

pub async fn insights<S>(
  State(state): State<AppState<S>>,
  Path((uid, date)): Path<(String, String)>,
) -> Result<Json<Vec<Insight>>, ApiError>
where
  S: TruthStore + 'static,
{
  let date = day_path(&date)?;
  let insights = state
    .pipeline
    .store()
    .list_insights(&uid, date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(insights))
}

pub async fn intelligence_context<S>(
  State(state): State<AppState<S>>,
  Path((uid, date)): Path<(String, String)>,
) -> Result<Json<IntelligenceContext>, ApiError>
where
  S: TruthStore + 'static,
{
  let date = day_path(&date)?;
  let context = state
    .pipeline
    .store()
    .get_intelligence_context(&uid, date)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no intelligence context for {uid} on {date}"))
    })?;
  Ok(Json(context))
}

/// Everything a client needs for one day in a single response. Missing
/// derived documents are simply absent; readiness is the client's call.
pub async fn day<S>(
  State(state): State<AppState<S>>,
  Path((uid, date)): Path<(String, String)>,
) -> Result<Json<DayTruth>, ApiError>
where
  S: TruthStore + 'static,
{
  let date = day_path(&date)?;
  let store = state.pipeline.store();

  let events = store.list_canonical_events(&uid, date).await.map_err(ApiError::store)?;
  let facts = store.get_daily_facts(&uid, date).await.map_err(ApiError::store)?;
  let insights = store.list_insights(&uid, date).await.map_err(ApiError::store)?;
  let context = store
    .get_intelligence_context(&uid, date)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(DayTruth::new(&uid, date, &events, facts, insights, context)))
}

#[derive(Debug, Deserialize)]
pub struct FailureParams {
  pub limit: Option<usize>,
}

/// Most recent first. `?limit` defaults to 50 and is capped at 500.
pub async fn failures<S>(
  State(state): State<AppState<S>>,
  Path(uid): Path<String>,
  Query(params): Query<FailureParams>,
) -> Result<Json<Vec<Failure>>, ApiError>
where
  S: TruthStore + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_FAILURE_LIMIT).min(MAX_FAILURE_LIMIT);
  let failures = state
    .pipeline
    .store()
    .list_failures(&uid, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(failures))
}
