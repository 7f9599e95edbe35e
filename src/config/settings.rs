//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub resolution: ResolutionConfig,
    #[serde(default = "ProviderConfig::builtin")]
    pub providers: Vec<ProviderConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11434
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Default bounds for provider calls and reply resolution
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolutionConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    60000
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_poll_timeout() -> u64 {
    60000
}

fn default_stream_timeout() -> u64 {
    120000
}

fn default_true() -> bool {
    true
}

/// One provider instance to register at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the adapter's built-in endpoint root
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub prepend_prompt: String,

    #[serde(default)]
    pub append_prompt: String,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    #[serde(default)]
    pub poll_timeout_ms: Option<u64>,

    #[serde(flatten)]
    pub kind: ProviderKind,
}

/// Adapter selection plus the adapter's own static settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderKind {
    Scoutly {
        #[serde(default = "default_language")]
        language: String,
        /// Fixed session identifier; a fresh one is generated per instance when unset
        #[serde(default)]
        session: Option<String>,
        #[serde(default)]
        initial_prompt: String,
    },
    Att,
    ChatWith {
        #[serde(default = "default_chatbot_id")]
        chatbot_id: String,
        /// Resume an existing session instead of generating one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Decagon {
        team_id: String,
        flow_id: String,
        #[serde(default)]
        metadata_url: String,
        #[serde(default = "default_timezone")]
        timezone: String,
        /// Resume an existing conversation instead of opening one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Shopify,
    MyCity,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_chatbot_id() -> String {
    "d653985a-3e95-42b8-a726-d7a4173c3b55".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Scoutly { .. } => "scoutly",
            ProviderKind::Att => "att",
            ProviderKind::ChatWith { .. } => "chatwith",
            ProviderKind::Decagon { .. } => "decagon",
            ProviderKind::Shopify => "shopify",
            ProviderKind::MyCity => "mycity",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderConfig {
    /// Create a config with default settings for the given kind
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            base_url: None,
            prepend_prompt: String::new(),
            append_prompt: String::new(),
            timeout_ms: None,
            poll_interval_ms: None,
            poll_timeout_ms: None,
            kind,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Providers registered when no providers file is present
    pub fn builtin() -> Vec<ProviderConfig> {
        vec![
            ProviderConfig::new(
                "scoutly",
                ProviderKind::Scoutly {
                    language: default_language(),
                    session: None,
                    initial_prompt: String::new(),
                },
            ),
            ProviderConfig::new("att", ProviderKind::Att),
            ProviderConfig::new(
                "chatwith",
                ProviderKind::ChatWith {
                    chatbot_id: default_chatbot_id(),
                    session_id: None,
                },
            ),
            ProviderConfig::new(
                "substack",
                ProviderKind::Decagon {
                    team_id: "14".to_string(),
                    flow_id: "substack".to_string(),
                    metadata_url: "https://substack.com/support".to_string(),
                    timezone: default_timezone(),
                    session_id: None,
                },
            ),
            ProviderConfig::new("shopify", ProviderKind::Shopify),
            ProviderConfig::new("mycity", ProviderKind::MyCity),
        ]
    }
}

/// Providers file layout understood by this build
pub const PROVIDERS_FILE_VERSION: &str = "1";

/// YAML providers file structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProvidersFile {
    /// Layout version; unset means the current one
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_paths("config/gateway.yaml", Some("config/providers.yaml"))
    }

    /// Load settings from YAML configuration files
    pub fn load_from_paths<P: AsRef<Path>>(
        gateway_config: P,
        providers_config: Option<P>,
    ) -> Result<Self> {
        let gateway_path = gateway_config.as_ref();

        let format = if gateway_path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.cors", false)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("resolution.request_timeout_ms", default_request_timeout() as i64)?
            .set_default("resolution.poll_interval_ms", default_poll_interval() as i64)?
            .set_default("resolution.poll_timeout_ms", default_poll_timeout() as i64)?
            .set_default("resolution.stream_timeout_ms", default_stream_timeout() as i64)?;

        if gateway_path.exists() {
            config_builder = config_builder.add_source(File::from(gateway_path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("OPENLLMS")
                .separator("__")
                .try_parsing(true),
        );

        let config = config_builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if let Some(providers_path) = providers_config {
            let providers_path = providers_path.as_ref();
            if providers_path.exists() {
                let file = Self::load_providers_config(providers_path)?;
                if !file.providers.is_empty() {
                    settings.providers = file.providers;
                }
            }
        }

        Ok(settings)
    }

    /// Load provider declarations from a YAML file
    pub fn load_providers_config<P: AsRef<Path>>(path: P) -> Result<ProvidersFile> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to read providers config: {}",
                e
            )))
        })?;

        let file: ProvidersFile = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to parse providers config: {}",
                e
            )))
        })?;

        let major = file.version.split('.').next().unwrap_or_default();
        if !major.is_empty() && major != PROVIDERS_FILE_VERSION {
            return Err(invalid(format!(
                "Unsupported providers file version '{}'",
                file.version
            )));
        }

        Ok(file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0".to_string()));
        }

        if self.resolution.poll_interval_ms == 0 || self.resolution.poll_timeout_ms == 0 {
            return Err(invalid(
                "Poll interval and timeout must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                return Err(invalid("Provider name cannot be empty".to_string()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(invalid(format!(
                    "Provider '{}' is declared more than once",
                    provider.name
                )));
            }
            if provider.poll_interval_ms == Some(0) || provider.poll_timeout_ms == Some(0) {
                return Err(invalid(format!(
                    "Provider '{}' has a zero poll interval or timeout",
                    provider.name
                )));
            }
        }

        Ok(())
    }

    /// Get enabled providers
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                cors: false,
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            resolution: ResolutionConfig::default(),
            providers: ProviderConfig::builtin(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            poll_timeout_ms: default_poll_timeout(),
            stream_timeout_ms: default_stream_timeout(),
        }
    }
}
