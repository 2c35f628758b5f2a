//! API server lifecycle: bind, spawn the axum server, return a handle
//! with a shutdown channel.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

/// Bind to `bind` (port 0 picks an ephemeral port) and serve the API in
/// a background task.
pub async fn start_api_server(core: Arc<CoreState>, bind: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind API server on {bind}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

/// Serve in the foreground until `shutdown` resolves.
pub async fn serve<F>(core: Arc<CoreState>, bind: SocketAddr, shutdown: F) -> Result<(), String>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind API server on {bind}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    tracing::info!(%addr, "Listening");
    axum::serve(listener, api_router(core))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| format!("API server error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_core() -> (Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: tmp.path().join("clinica.db"),
            ..AppConfig::default()
        };
        (Arc::new(CoreState::new(&config).unwrap()), tmp)
    }

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let (core, _tmp) = test_core();
        let mut server = start_api_server(core, localhost()).await.expect("server should start");
        assert!(server.addr.port() > 0);

        let resp = reqwest::get(format!("http://{}/api/health", server.addr)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let resp = reqwest::get(format!("http://{}/nonexistent", server.addr)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (core, _tmp) = test_core();
        let mut server = start_api_server(core, localhost()).await.unwrap();
        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let (core, _tmp) = test_core();
        let server = start_api_server(core.clone(), localhost()).await.unwrap();
        let err = start_api_server(core, server.addr).await.err().unwrap();
        assert!(err.contains("Failed to bind"));
    }

    #[tokio::test]
    async fn foreground_serve_stops_on_signal() {
        let (core, _tmp) = test_core();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(core, localhost(), async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
