//! vitals server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, optionally starts the background recompute job, and serves the
//! JSON API over HTTP.

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vitals_api::AppState;
use vitals_pipeline::Pipeline;
use vitals_providers::Resync;
use vitals_store_sqlite::SqliteStore;

use crate::settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "vitals truth pipeline server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let pipeline = Pipeline::new(Arc::new(store), cfg.pipeline.clone())
    .context("invalid pipeline configuration")?;
  let resync = Resync::new(pipeline.clone(), cfg.providers.clone(), cfg.resync.clone())
    .context("failed to build provider client")?;

  if let Some(secs) = cfg.schedule.recompute_interval_secs.filter(|s| *s > 0) {
    spawn_recompute(pipeline.clone(), Duration::from_secs(secs));
  }

  let app = vitals_api::router(AppState { pipeline, resync });
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Recompute today and yesterday for every user on a fixed period.
fn spawn_recompute(pipeline: Pipeline<SqliteStore>, period: Duration) {
  tracing::info!(period_secs = period.as_secs(), "scheduling recompute job");
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match pipeline.recompute_recent(Utc::now()).await {
        Ok(days) => tracing::info!(days, "scheduled recompute finished"),
        Err(e) => tracing::warn!(error = %e, "scheduled recompute failed"),
      }
    }
  });
}
