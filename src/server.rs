use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    routing::post,
    Router,
};
use tracing::{info, warn};

use crate::bot::Bot;
use crate::platform::Update;

/// Body returned for every webhook delivery.
pub const ACK: &str = "ok";

pub fn router(bot: Arc<Bot>) -> Router {
    Router::new().route("/", post(webhook)).with_state(bot)
}

// Telegram redelivers anything that is not a 200, so every body is
// acknowledged, including ones that are too large or fail to parse.
async fn webhook(
    State(bot): State<Arc<Bot>>,
    body: Result<Bytes, BytesRejection>,
) -> &'static str {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!("Ignoring unreadable webhook body: {}", e);
            return ACK;
        }
    };

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            bot.handle(update).await;
        }
        Err(e) => warn!("Ignoring unparseable webhook body ({} bytes): {}", body.len(), e),
    }
    ACK
}

/// Bind `addr` and serve the webhook until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, bot: Arc<Bot>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening for webhooks on {}", addr);

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Webhook server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
