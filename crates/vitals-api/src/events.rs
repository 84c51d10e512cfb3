//! `POST /users/{uid}/events`: the ingestion boundary.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use vitals_core::{event::IngestEnvelope, store::TruthStore};

use crate::{AppState, error::ApiError, parse_json};

/// Returns 201 with the [`IngestOutcome`] when the raw event is new, 200 when
/// it was a duplicate delivery.
///
/// [`IngestOutcome`]: vitals_pipeline::IngestOutcome
pub async fn ingest<S>(
  State(state): State<AppState<S>>,
  Path(uid): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: TruthStore + 'static,
{
  let envelope: IngestEnvelope = parse_json(&body)?;
  let outcome = state.pipeline.ingest(&uid, envelope, Utc::now()).await?;
  let status = if outcome.dedup { StatusCode::OK } else { StatusCode::CREATED };
  Ok((status, Json(outcome)))
}
