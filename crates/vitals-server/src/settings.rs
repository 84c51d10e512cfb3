//! Runtime configuration: an optional TOML file layered under `VITALS_*`
//! environment variables. Nested keys use `__`, e.g.
//! `VITALS_PIPELINE__RECOMPUTE_ON_INGEST=false`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use vitals_pipeline::PipelineConfig;
use vitals_providers::{ProvidersConfig, ResyncConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub pipeline:   PipelineConfig,
  #[serde(default)]
  pub resync:     ResyncConfig,
  #[serde(default)]
  pub providers:  ProvidersConfig,
  #[serde(default)]
  pub schedule:   ScheduleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
  /// Period of the background recompute of today and yesterday. Unset
  /// disables the job.
  pub recompute_interval_secs: Option<u64>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/vitals/vitals.db") }

impl ServerConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("VITALS")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
