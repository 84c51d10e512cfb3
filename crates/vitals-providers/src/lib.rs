//! Provider integrations: Oura and Withings clients, the resync job and
//! webhook verification.

pub mod config;
pub mod error;
mod http;
pub mod oura;
pub mod resync;
pub mod webhook;
pub mod withings;

pub use self::{
  config::{OuraConfig, ProvidersConfig, ResyncConfig, WithingsConfig},
  error::{Error, Result},
  resync::{Resync, ResyncReport},
};
