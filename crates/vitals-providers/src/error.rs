//! Error types for `vitals-providers`.

use thiserror::Error;
use vitals_core::event::Provider;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("unsupported provider: {0:?}")]
  UnsupportedProvider(String),

  #[error("{0} integration is not configured")]
  NotConfigured(Provider),

  #[error("no {provider} access token for user {user_id}")]
  MissingAccessToken { provider: Provider, user_id: String },

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("{provider} request failed: {source}")]
  Http {
    provider: Provider,
    #[source]
    source:   reqwest::Error,
  },

  #[error("{provider} responded {status}: {body}")]
  ProviderStatus {
    provider: Provider,
    status:   u16,
    body:     String,
  },

  #[error("{provider} response rejected: {message}")]
  ProviderResponse { provider: Provider, message: String },

  #[error("webhook signature mismatch")]
  InvalidSignature,

  #[error("malformed webhook body: {0}")]
  MalformedWebhook(#[source] serde_json::Error),

  #[error(transparent)]
  Pipeline(#[from] vitals_pipeline::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  /// Terminal, caller-side problems (400-class): retrying without changing
  /// the request or the integration setup cannot succeed.
  pub fn is_client_error(&self) -> bool {
    match self {
      Self::InvalidRequest(_)
      | Self::UnsupportedProvider(_)
      | Self::NotConfigured(_)
      | Self::MissingAccessToken { .. }
      | Self::MalformedWebhook(_) => true,
      Self::Pipeline(e) => e.is_client_error(),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
