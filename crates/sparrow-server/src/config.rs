//! Configuration for the Sparrow Server
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};
use sparrow_core::LEAVE_PROCESS_KEY;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,

    /// YAML file with process definitions to publish at startup
    #[serde(default)]
    pub process_definitions_path: Option<String>,

    /// Definition key served under `/leave`
    #[serde(default = "default_leave_process_key")]
    pub leave_process_key: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_leave_process_key() -> String {
    LEAVE_PROCESS_KEY.to_string()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> ServerResult<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.port = port;
            } else {
                warn!("Invalid SERVER_PORT value: {}", port);
            }
        }

        if let Ok(host) = env::var("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(format) = env::var("LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    warn!("Invalid LOG_FORMAT value: {}, using pretty", format);
                    LogFormat::Pretty
                }
            };
        }

        if let Ok(path) = env::var("PROCESS_DEFINITIONS_PATH") {
            if !path.trim().is_empty() {
                config.process_definitions_path = Some(path);
            }
        }

        if let Ok(key) = env::var("LEAVE_PROCESS_KEY") {
            config.leave_process_key = key;
        }

        config.validate()?;

        info!("Loaded server configuration");
        Ok(config)
    }

    /// Check values that have no usable fallback
    pub fn validate(&self) -> ServerResult<()> {
        if self.bind_address.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "Bind address must not be empty".to_string(),
            ));
        }

        if self.leave_process_key.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "Leave process key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            process_definitions_path: None,
            leave_process_key: default_leave_process_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.leave_process_key, "leaveProcess");
        assert!(config.process_definitions_path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let config = ServerConfig {
            leave_process_key: " ".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::ConfigError(_))));
    }
}
