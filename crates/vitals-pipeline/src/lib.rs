//! The vitals truth pipeline.
//!
//! Pure stages, leaves first:
//!
//! - [`mapper`]: raw event to canonical event, or a typed rejection
//! - [`aggregate`]: a day's canonical events to [`DailyFacts`]
//! - [`insights`]: a window of daily facts to insights
//! - [`assemble`]: facts and insights to an intelligence context
//!
//! [`Pipeline`] drives them against any [`TruthStore`].
//!
//! [`DailyFacts`]: vitals_core::facts::DailyFacts
//! [`TruthStore`]: vitals_core::store::TruthStore

pub mod aggregate;
pub mod assemble;
pub mod config;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod mapper;

#[cfg(test)]
mod faulty;

pub use self::{
  config::PipelineConfig,
  error::{Error, Result},
  ingest::{IngestOutcome, Pipeline},
};
