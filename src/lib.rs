//! OpenLLMs Gateway
//!
//! Uniform query access to undocumented web chat backends, with a model
//! registry and an Ollama-compatible HTTP surface on top.

pub mod api;
pub mod config;
pub mod error;
pub mod provider;

pub use error::{AppError, Result};

use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{LoggingConfig, Settings};
use provider::ModelRegistry;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(settings: Settings, registry: ModelRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
