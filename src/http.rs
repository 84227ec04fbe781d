//! Status endpoint: `/health` for liveness and `/metrics` for Prometheus.
//!
//! Served only when `metrics_port` is non-zero, and stopped with the rest of
//! the bot on shutdown.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use rankbot_core::RegistryHandle;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// What `/health` reports about the running bot.
pub struct BotStatus {
    name: String,
    started: Instant,
    registry: RegistryHandle,
}

impl BotStatus {
    pub fn new(name: impl Into<String>, registry: RegistryHandle) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
            registry,
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    name: String,
    version: &'static str,
    uptime_secs: u64,
    commands: usize,
    categories: usize,
}

async fn health(State(status): State<Arc<BotStatus>>) -> Json<Health> {
    let registry = status.registry.snapshot();
    Json(Health {
        status: "ok",
        name: status.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: status.started.elapsed().as_secs(),
        commands: registry.len(),
        categories: registry.by_category().len(),
    })
}

async fn metrics() -> String {
    crate::metrics::gather_metrics()
}

fn router(status: Arc<BotStatus>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(status)
}

/// Bind the status endpoint on every interface.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serve the status endpoint on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, status: Arc<BotStatus>, shutdown: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Status endpoint listening");
    }
    let served = axum::serve(listener, router(status))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;
    if let Err(e) = served {
        error!(error = %e, "Status endpoint failed");
    }
}
