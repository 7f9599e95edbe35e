//! API module - Ollama-compatible routes, handlers, and models

pub mod handlers;
pub mod models;
pub mod prompt;
pub mod routes;
