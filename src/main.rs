use std::sync::Arc;

use anyhow::{Context, Result};
use prompt_engine::server::{self, AppState};
use prompt_engine::{Config, ExecCtx, SqliteRecorder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,prompt_engine=debug";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("prompt-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("failed to load configuration")?;
    if config.demo_mode() {
        warn!("no provider API key configured, every call will return a demo response");
    }

    let ctx = ExecCtx::from_config(&config).context("failed to build execution context")?;
    info!(templates = ctx.templates.len(), default_model = %ctx.default_model, "templates ready");

    let recorder = SqliteRecorder::builder(config.database_url.as_str())
        .build()
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    info!(database = %config.database_url, "execution recorder ready");

    let app = server::router(AppState::new(ctx, Arc::new(recorder)));
    server::serve(config.bind_addr, app)
        .await
        .with_context(|| format!("server on {} failed", config.bind_addr))?;

    info!("prompt-engine stopped");
    Ok(())
}
