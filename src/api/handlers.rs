//! HTTP request handlers

use crate::api::models::{
    AssistantMessage, ChatRequest, ChatResponse, CreateRequest, GenerateRequest,
    GenerateResponse, ModelRequest, ModelTag, ResponseEnvelope, ShowResponse, StatusResponse,
    TagsResponse, VersionResponse, OLLAMA_VERSION,
};
use crate::api::prompt::{build_chat_prompt, extract_tool_call, with_overlay};
use crate::error::{AppError, Result};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

fn payload<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

fn elapsed_nanos(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Liveness probe
pub async fn index() -> &'static str {
    "Ollama is running"
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: OLLAMA_VERSION.to_string(),
    })
}

/// List static providers followed by derived models
pub async fn list_tags(State(state): State<Arc<AppState>>) -> Json<TagsResponse> {
    let registry = &state.registry;

    let mut models: Vec<ModelTag> = registry
        .providers()
        .iter()
        .map(|provider| ModelTag::new(provider.name(), provider.family()))
        .collect();

    for derived in registry.derived_models() {
        let family = registry
            .provider(&derived.base)
            .map(|provider| provider.family().to_string())
            .unwrap_or_else(|| derived.base.clone());
        models.push(ModelTag::new(&derived.name, &family));
    }

    Json(TagsResponse { models })
}

/// Single-prompt generation
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>> {
    let request = payload(body)?;
    info!(model = %request.model, "Received generate request");

    let (provider, system) = state.registry.resolve_provider(&request.model)?;
    let prompt = with_overlay(&system, &request.prompt);

    let start = Instant::now();
    let reply = provider.query(&prompt).await?;
    let duration = elapsed_nanos(start);

    info!(model = %request.model, provider = %provider.name(), duration_ns = duration, "Generate completed");

    Ok(Json(GenerateResponse {
        envelope: ResponseEnvelope::new(request.model, duration),
        response: reply.message,
    }))
}

/// Chat with optional tool-call synthesis
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let request = payload(body)?;
    info!(
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.len(),
        "Received chat request"
    );

    let (provider, system) = state.registry.resolve_provider(&request.model)?;
    let prompt = build_chat_prompt(&system, &request.messages, &request.tools);
    debug!(prompt = %prompt, "Chat prompt");

    let start = Instant::now();
    let reply = provider.query(&prompt).await?;
    let duration = elapsed_nanos(start);

    let text = reply.message.trim();
    let message = match extract_tool_call(text) {
        Some(call) => {
            info!(tool = %call.function.name, "Returning tool call");
            AssistantMessage::tool_call(call)
        }
        None => AssistantMessage::text(text),
    };

    Ok(Json(ChatResponse {
        envelope: ResponseEnvelope::new(request.model, duration),
        message,
    }))
}

/// Static metadata for a resolved model
pub async fn show(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<ShowResponse>> {
    let request = payload(body)?;
    let (provider, _) = state.registry.resolve_provider(&request.model)?;

    Ok(Json(ShowResponse::new(provider.name(), provider.family())))
}

/// Nothing is ever resident
pub async fn list_running() -> Json<TagsResponse> {
    Json(TagsResponse { models: Vec::new() })
}

pub async fn create_model(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let request = payload(body)?;
    state
        .registry
        .create_derived(&request.model, &request.from, &request.system)?;

    Ok(Json(StatusResponse::success()))
}

/// Pull and push are accepted without doing anything
pub async fn pull_push() -> Json<StatusResponse> {
    Json(StatusResponse::completed())
}

pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let request = payload(body)?;
    if !state.registry.delete_derived(&request.model) {
        debug!(model = %request.model, "No derived model to delete");
    }

    Ok(Json(StatusResponse::success()))
}
