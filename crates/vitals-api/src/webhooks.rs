//! `POST /webhooks/oura`.

use axum::{
  Json,
  extract::State,
  http::HeaderMap,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Value, json};
use vitals_core::{event::Provider, store::TruthStore};
use vitals_providers::webhook::{SIGNATURE_HEADER, receipt_from_body, verify_signature};

use crate::{AppState, error::ApiError};

/// Verify the signature over the raw body, then record the notification
/// create-only. A redelivery answers 200 with `dedup: true`.
pub async fn oura<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  S: TruthStore + 'static,
{
  let secret = state
    .resync
    .providers()
    .oura
    .as_ref()
    .and_then(|c| c.webhook_secret.as_deref())
    .ok_or(vitals_providers::Error::NotConfigured(Provider::Oura))?;

  let signature = headers
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {SIGNATURE_HEADER} header")))?;
  verify_signature(secret, &body, signature)?;

  let receipt = receipt_from_body(&body, Utc::now())?;
  let id = receipt.id.clone();
  let written = state
    .pipeline
    .store()
    .create_webhook_receipt(receipt)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(event_id = %id, created = written.is_created(), "oura webhook received");

  let mut out = json!({ "ok": true, "eventId": id });
  if !written.is_created() {
    out["dedup"] = json!(true);
  }
  Ok(Json(out))
}
