//! HTTP server lifecycle.

use crate::{error::ServerError, routes::create_router, shutdown::shutdown_signal, state::AppState};
use gateway_config::ServerConfig;
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Binds the listener and serves the router until shutdown
pub struct Server {
    addr: String,
    shutdown_timeout: Duration,
    state: AppState,
}

impl Server {
    /// Create a server from listen settings and application state
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            addr: format!("{}:{}", config.host, config.port),
            shutdown_timeout: config.shutdown_timeout,
            state,
        }
    }

    /// Listen address as `host:port`
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            shutdown_signal().await;
        })
        .await
    }

    /// Serve until `shutdown` resolves.
    ///
    /// In-flight streams get `shutdown_timeout` to finish; after that the
    /// server stops regardless.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Host names are resolved by the bind
        let listener = TcpListener::bind(self.addr.as_str())
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Gateway listening");

        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let graceful = async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        };

        let app = create_router(self.state);
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .into_future();

        let grace = self.shutdown_timeout;
        let drain_deadline = async move {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = serve => {
                result?;
                info!("Server stopped");
            }
            () = drain_deadline => {
                warn!(timeout = ?grace, "Shutdown timeout elapsed, dropping open streams");
            }
        }
        Ok(())
    }
}
