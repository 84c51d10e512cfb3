//! Error types for `vitals-pipeline`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The ingestion envelope is unusable before any write happens.
  #[error("invalid envelope: {0}")]
  InvalidEnvelope(String),

  #[error("insight window of {days} days is shorter than the minimum of {min}")]
  WindowTooShort { days: u32, min: u32 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  /// True when the caller sent something unusable, as opposed to the pipeline
  /// failing at runtime.
  pub fn is_client_error(&self) -> bool { matches!(self, Self::InvalidEnvelope(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
