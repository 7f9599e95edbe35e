//! API request and response models (Ollama compatible)

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Version reported by `/api/version`
pub const OLLAMA_VERSION: &str = "0.5.7";

/// Advertised model size in bytes
pub const MODEL_SIZE: u64 = 6_591_830_464;

const MODEL_FORMAT: &str = "gguf";
const PARAMETER_SIZE: &str = "4.3B";
const QUANTIZATION_LEVEL: &str = "Q4_K_M";

/// Current UTC time with millisecond precision and a `Z` suffix
pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Stable pseudo-digest of a model name
pub fn fingerprint(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}

/// Generate request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub model: String,

    #[serde(default)]
    pub prompt: String,
}

/// One chat turn
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
        }
    }
}

/// Callable tool descriptor
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolSpec {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolFunction {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON schema of the arguments
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Chat request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub model: String,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// Request naming a single model (show, delete)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelRequest {
    #[serde(default)]
    pub model: String,
}

/// Derived model creation request
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub system: String,
}

/// Fields shared by every generation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub model: String,
    pub created_at: String,
    pub done: bool,
    pub done_reason: String,
    /// Wall-clock time spent on the provider query, in nanoseconds
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: u64,
    pub prompt_eval_duration: u64,
    pub eval_count: u64,
    pub eval_duration: u64,
}

impl ResponseEnvelope {
    pub fn new(model: impl Into<String>, total_duration: u64) -> Self {
        Self {
            model: model.into(),
            created_at: now_iso(),
            done: true,
            done_reason: "stop".to_string(),
            total_duration,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: 0,
            eval_count: 0,
            eval_duration: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub envelope: ResponseEnvelope,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub envelope: ResponseEnvelope,
    pub message: AssistantMessage,
}

/// Assistant turn: plain text, or a single tool call with empty content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: vec![call],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: ToolCallFunction {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// Static descriptive metadata of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub format: String,
    pub family: String,
    pub families: Vec<String>,
    pub parameter_size: String,
    pub quantization_level: String,
}

impl ModelDetails {
    pub fn for_family(family: &str) -> Self {
        Self {
            format: MODEL_FORMAT.to_string(),
            family: family.to_string(),
            families: vec![family.to_string()],
            parameter_size: PARAMETER_SIZE.to_string(),
            quantization_level: QUANTIZATION_LEVEL.to_string(),
        }
    }
}

/// One entry of `/api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTag {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    pub size: u64,
    pub digest: String,
    pub details: ModelDetails,
}

impl ModelTag {
    pub fn new(name: &str, family: &str) -> Self {
        let tagged = format!("{}:latest", name);
        Self {
            name: tagged.clone(),
            model: tagged,
            modified_at: now_iso(),
            size: MODEL_SIZE,
            digest: fingerprint(name),
            details: ModelDetails::for_family(family),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowResponse {
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub details: ModelDetails,
}

impl ShowResponse {
    pub fn new(model: &str, family: &str) -> Self {
        Self {
            modelfile: format!("FROM {}\nPARAMETER temperature 0.7", model),
            parameters: "temperature 0.7\nnum_ctx 4096".to_string(),
            template: "{{ .System }}\nUSER: {{ .Prompt }}\nASSISTANT: ".to_string(),
            details: ModelDetails::for_family(family),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Generic status body for lifecycle routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            completed: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: "success".to_string(),
            completed: Some(true),
        }
    }
}
