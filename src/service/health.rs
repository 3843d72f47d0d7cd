//! HTTP liveness probe.

use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::info;

use crate::base::types::{Res, Void};

/// Static acknowledgment returned by the probe.
pub const HEALTH_MESSAGE: &str = "Slack Bot is running with Socket Mode";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub message: String,
}

/// The probe's routes.
pub fn router() -> Router {
    Router::new().route("/demo/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { message: HEALTH_MESSAGE.to_string() })
}

/// A running health probe server.
pub struct HealthServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl HealthServer {
    /// Bind and start serving in the background.
    pub async fn start(bind: &str) -> Res<Self> {
        let listener = TcpListener::bind(bind).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, router())
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        info!("Health probe listening on `{}`.", addr);

        Ok(Self {
            addr,
            shutdown: Some(shutdown),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving and wait for in-flight requests to finish.
    pub async fn stop(mut self) -> Void {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        self.task.await??;

        info!("Health probe stopped.");

        Ok(())
    }
}

// Tests.
