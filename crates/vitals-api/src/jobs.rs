//! Job triggers.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/jobs/resync` | `{"uid": "...", "provider": "oura" \| "withings"}` |
//! | `POST` | `/jobs/recompute` | `{"uid": "...", "date": "YYYY-MM-DD"}` |

use axum::{Json, extract::State};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use vitals_core::{facts::parse_day, store::TruthStore};

use crate::{AppState, error::ApiError, parse_json};

#[derive(Debug, Deserialize)]
pub struct ResyncBody {
  pub uid:      String,
  pub provider: String,
}

pub async fn resync<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  S: TruthStore + 'static,
{
  let ResyncBody { uid, provider } = parse_json(&body)?;
  let report = state.resync.run(&uid, &provider, Utc::now()).await?;
  Ok(Json(json!({
    "ok": true,
    "provider": report.provider,
    "uid": uid,
    "report": report,
  })))
}

#[derive(Debug, Deserialize)]
pub struct RecomputeBody {
  pub uid:  String,
  pub date: String,
}

pub async fn recompute<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  S: TruthStore + 'static,
{
  let RecomputeBody { uid, date } = parse_json(&body)?;
  if uid.trim().is_empty() {
    return Err(ApiError::BadRequest("uid must not be empty".into()));
  }
  let date = parse_day(&date).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  state.pipeline.recompute_day(&uid, date, Utc::now()).await?;
  Ok(Json(json!({ "ok": true, "uid": uid, "date": date })))
}
