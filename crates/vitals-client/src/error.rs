//! Error types for `vitals-client`.
//!
//! Request outcomes are never errors here; they are [`ApiFailure`] values so
//! callers can branch on the failure kind.
//!
//! [`ApiFailure`]: crate::contract::ApiFailure

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
