//! Error types for `vitals-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown event kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown provider: {0:?}")]
  UnknownProvider(String),

  #[error("invalid date {0:?}; expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
