//! Application error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by providers, the registry and the HTTP layer
#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream read error: {0}")]
    StreamRead(#[from] std::io::Error),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Authentication failed for provider '{provider}': {reason}")]
    Authentication { provider: String, reason: String },

    #[error("Provider '{provider}' did not respond within {waited:?}")]
    ResolutionTimeout { provider: String, waited: Duration },

    #[error("Provider '{provider}' closed the stream without a final response")]
    MissingTerminalResponse { provider: String },

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Base model '{0}' not found")]
    UnknownBase(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// HTTP status reported to shim callers
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ModelNotFound(_) | AppError::UnknownBase(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ResolutionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Transport(_)
            | AppError::StreamRead(_)
            | AppError::Backend { .. }
            | AppError::Authentication { .. }
            | AppError::MissingTerminalResponse { .. } => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the timeout raised by polled and streamed resolution
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::ResolutionTimeout { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
