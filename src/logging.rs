//! Logging Module
//!
//! Tracing subscriber setup for the proxy process: env-filtered level
//! control with a rolling daily application log, or stdout when no log
//! directory is configured.

use crate::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling application log; stdout when unset.
    #[serde(default)]
    pub app_log_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_log_dir: None,
            log_level: default_log_level(),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns the appender guard which must be held for the process lifetime
/// when logging to a file. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ProxyError::ConfigError(format!("invalid log level: {}", e)))?;

    match &config.app_log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "xlo-proxy.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| ProxyError::ConfigError(format!("logging init failed: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .map_err(|e| ProxyError::ConfigError(format!("logging init failed: {}", e)))?;
            Ok(None)
        }
    }
}
