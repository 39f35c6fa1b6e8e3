pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use crate::state::SharedState;
use std::net::SocketAddr;
use tracing::info;

/// Bind and serve until ctrl-c.
pub async fn serve(state: SharedState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    info!("listening on http://{}", local);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
