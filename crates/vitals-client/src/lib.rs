//! Client side of the vitals API.
//!
//! Nothing from the network reaches a caller untrusted: [`contract`] parses
//! every response against its type, [`readiness`] decides whether a day's
//! derived truth may be shown, and [`fence`] drops results of superseded
//! requests.

pub mod client;
pub mod contract;
pub mod error;
pub mod fence;
pub mod readiness;

pub use self::{
  client::{DayTruthLoader, DayView, TruthClient},
  contract::{ApiFailure, Contract, FailureKind, Issue, RawResponse, RawResult, validate},
  error::{Error, Result},
  fence::{RequestFence, Ticket},
  readiness::{Readiness, ReadinessInput, ReadinessReason, ReadinessState, resolve},
};
