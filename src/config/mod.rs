//! Configuration module

pub mod settings;

pub use settings::{
    LoggingConfig, ProviderConfig, ProviderKind, ProvidersFile, ResolutionConfig, ServerConfig,
    Settings,
};
