//! Core types and trait definitions for the vitals truth pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod canonical;
pub mod context;
pub mod day;
pub mod error;
pub mod event;
pub mod facts;
pub mod failure;
pub mod idempotency;
pub mod insight;
pub mod store;

pub use error::{Error, Result};

/// Version of the derivation pipeline. Bumped whenever aggregation, rule or
/// assembly semantics change in a way that makes older derived documents
/// incomparable with newer ones.
pub const PIPELINE_VERSION: u32 = 1;

/// Version of the raw and canonical event schema accepted by the mapper.
pub const SCHEMA_VERSION: u32 = 1;
