//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Every variant renders as
/// `{"ok": false, "error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error(transparent)]
  Pipeline(#[from] vitals_pipeline::Error),

  #[error(transparent)]
  Provider(#[from] vitals_providers::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Unauthorized(_)
      | Self::Provider(vitals_providers::Error::InvalidSignature) => StatusCode::UNAUTHORIZED,
      Self::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
      Self::Provider(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
      Self::Pipeline(_) | Self::Provider(_) | Self::Store(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let message = match &self {
      Self::NotFound(m) | Self::BadRequest(m) | Self::Unauthorized(m) => m.clone(),
      other => other.to_string(),
    };
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
  }
}
