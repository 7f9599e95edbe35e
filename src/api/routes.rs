//! HTTP route definitions

use crate::api::handlers;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Create the main application router
pub async fn create_router(state: Arc<crate::AppState>) -> Router {
    let cors_enabled = state.settings.server.cors;

    let router = Router::new()
        // GET also answers HEAD
        .route("/", get(handlers::index))
        .route("/api/version", get(handlers::version))
        .route("/api/tags", get(handlers::list_tags))
        .route("/api/generate", post(handlers::generate))
        .route("/api/chat", post(handlers::chat))
        .route("/api/show", post(handlers::show))
        .route("/api/ps", get(handlers::list_running))
        .route("/api/create", post(handlers::create_model))
        .route("/api/pull", post(handlers::pull_push))
        .route("/api/push", post(handlers::pull_push))
        .route("/api/delete", delete(handlers::delete_model))
        .with_state(state)
        // Ollama clients expect JSON on every route, the liveness string included
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::DELETE])
                .allow_headers(Any),
        )
    } else {
        router
    }
}
