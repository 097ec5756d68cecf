//! HTTP surface.
//!
//! [`router`] returns a composable axum `Router` with every route nested
//! under `/api/`. [`serve`] binds it and runs until Ctrl-C.

pub mod error;
pub mod handlers;
mod router;

pub use error::ApiError;
pub use router::router;

use crate::exec_ctx::ExecCtx;
use crate::recorder::ExecutionRecorder;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: ExecCtx,
    pub recorder: Arc<dyn ExecutionRecorder>,
}

impl AppState {
    pub fn new(ctx: ExecCtx, recorder: Arc<dyn ExecutionRecorder>) -> Self {
        Self { ctx, recorder }
    }
}

/// Serve `app` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "prompt engine listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
