//! Main Sparrow Server implementation

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use sparrow_core::WorkflowEngine;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Main server implementation
#[derive(Clone)]
pub struct SparrowServer {
    /// Configuration
    pub config: ServerConfig,

    /// Workflow engine behind the API
    engine: Arc<dyn WorkflowEngine>,
}

/// Manual Debug implementation that doesn't try to debug the trait objects
impl std::fmt::Debug for SparrowServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparrowServer")
            .field("config", &self.config)
            .finish()
    }
}

impl SparrowServer {
    /// Create a new SparrowServer
    pub fn new(config: ServerConfig, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { config, engine }
    }

    /// The workflow engine
    pub fn engine(&self) -> &dyn WorkflowEngine {
        self.engine.as_ref()
    }

    /// Definition key served under `/leave`
    pub fn leave_process_key(&self) -> &str {
        &self.config.leave_process_key
    }

    /// Bind the configured address and serve until a shutdown signal
    pub async fn run(self) -> ServerResult<()> {
        info!("Starting Sparrow Server");

        let app = crate::api::build_router(Arc::new(self.clone()));

        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(addr.as_str()).await?;
        let addr: SocketAddr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::InternalError(format!("Server error: {}", e)))?;

        info!("Sparrow Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
