//! Pipeline tuning, deserialised from the server's `[pipeline]` table.

use serde::Deserialize;

use crate::{
  Error, Result,
  assemble::ContextPolicy,
  insights::MIN_WINDOW_DAYS,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Recompute the affected day right after a successful ingest.
  pub recompute_on_ingest:   bool,
  /// Days of daily facts the insight rules look at, ending on the target day.
  pub insight_window_days:   u32,
  pub min_domain_confidence: f64,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      recompute_on_ingest:   true,
      insight_window_days:   MIN_WINDOW_DAYS,
      min_domain_confidence: ContextPolicy::default().min_domain_confidence,
    }
  }
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<()> {
    if self.insight_window_days < MIN_WINDOW_DAYS {
      return Err(Error::WindowTooShort {
        days: self.insight_window_days,
        min:  MIN_WINDOW_DAYS,
      });
    }
    Ok(())
  }

  pub fn context_policy(&self) -> ContextPolicy {
    ContextPolicy { min_domain_confidence: self.min_domain_confidence }
  }
}
