//! Axum server setup and graceful shutdown

use crate::{api, state::AppState, store::TaskStore, ServerConfig};
use axum::{
    routing::{get, post},
    Json, Router,
};
use std::future::IntoFuture;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Build the application router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/check", post(api::check_links_handler))
        .route("/api/status/:id", get(api::get_status_handler))
        .route("/api/report", post(api::report_handler))
        .route(
            "/api/health",
            get(|| async {
                Json(serde_json::json!({
                    "status": "ok",
                    "service": "linkwatch",
                    "version": env!("CARGO_PKG_VERSION")
                }))
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until a termination signal arrives.
///
/// Restores the snapshot before binding; a corrupt snapshot refuses
/// startup rather than silently starting empty. On SIGINT/SIGTERM the
/// state is saved once, then in-flight requests get a bounded grace
/// period to drain. In-flight probes race the process exit.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;
    state.store.restore_state().await?;
    state.store.spawn_snapshot_writer();

    let app = router(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Linkwatch listening on http://{}", addr);

    let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = shutdown_signal(state.store.clone(), drained_tx);

    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();
    tokio::select! {
        result = serve => result?,
        _ = grace_timer(drained_rx, config.shutdown_grace) => {
            tracing::warn!("Grace period expired, dropping in-flight requests");
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve once a termination signal arrives, after a final state save.
async fn shutdown_signal(store: TaskStore, drained_tx: tokio::sync::oneshot::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, saving state");
    if let Err(e) = store.save_state().await {
        tracing::error!("Final state save failed: {}", e);
    }

    let _ = drained_tx.send(());
}

/// Start counting down the grace period once the shutdown signal fires.
async fn grace_timer(drained_rx: tokio::sync::oneshot::Receiver<()>, grace: Duration) {
    let _ = drained_rx.await;
    tokio::time::sleep(grace).await;
}
