//!
//! Sparrow Server - HTTP front end of the Sparrow workflow engine
//!
//! This module exports all the components of the Sparrow Server.

use std::sync::Arc;

use sparrow_core::{
    LocalWorkflowEngine, ProcessDefinition, TracingEventHandler, WorkflowEngine,
};
use sparrow_state_inmemory::InMemoryStateStoreProvider;
use tracing::info;

/// API module
pub mod api;

/// Server module
pub mod server;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

// Re-export key types
pub use config::{LogFormat, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::SparrowServer;

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    init_logging(&config);

    let engine = create_engine(&config).await?;
    let server = SparrowServer::new(config, engine);

    server.run().await
}

/// Initialize logging
pub fn init_logging(config: &ServerConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    // A subscriber installed earlier (tests, embedding) stays in place
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}

/// Create the engine and publish the configured process definitions
pub async fn create_engine(config: &ServerConfig) -> ServerResult<Arc<dyn WorkflowEngine>> {
    let provider = InMemoryStateStoreProvider::new();
    let engine: LocalWorkflowEngine = provider.create_engine(Arc::new(TracingEventHandler));

    let definitions = load_definitions(config).await?;
    if !definitions
        .iter()
        .any(|d| d.key.0 == config.leave_process_key)
    {
        return Err(ServerError::ConfigError(format!(
            "No process definition with key '{}' is configured",
            config.leave_process_key
        )));
    }

    for definition in definitions {
        let published = engine.publish_definition(definition).await?;
        info!(
            definition_id = %published.id,
            name = %published.name,
            "Published process definition"
        );
    }

    Ok(Arc::new(engine))
}

/// Definitions from `process_definitions_path`, or the built-in leave process
async fn load_definitions(config: &ServerConfig) -> ServerResult<Vec<ProcessDefinition>> {
    match &config.process_definitions_path {
        Some(path) => {
            info!(path = %path, "Loading process definitions");
            let source = tokio::fs::read_to_string(path).await?;
            Ok(ProcessDefinition::from_yaml(&source)?)
        }
        None => {
            info!("Using built-in leave process definition");
            Ok(vec![ProcessDefinition::leave_process()])
        }
    }
}
