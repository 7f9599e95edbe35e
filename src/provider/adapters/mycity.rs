//! MyCity (NYC) adapter: replies arrive as newline-delimited JSON snapshots

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::provider::resolve::resolve_streamed;
use crate::provider::session::{SessionCell, SessionLifecycle};
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const MYCITY_BASE_URL: &str = "https://chat.nyc.gov";
const CONVERSATION_PATH: &str = "/conversation";
const TOOL_PREAMBLE: &str = r#"{"citations": [], "intent": "", "search_intent": ""}"#;

/// Session id plus the separately generated chat id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyCitySession {
    pub session_uuid: String,
    pub chat_uuid: String,
}

pub struct MyCityProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
    stream_timeout: Duration,
    session: SessionCell<MyCitySession>,
}

impl MyCityProvider {
    pub fn new(
        name: impl Into<String>,
        decoration: PromptDecoration,
        transport: HttpTransport,
        stream_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            decoration,
            transport,
            stream_timeout,
            session: SessionCell::new(),
        }
    }

    fn is_last(record: &Value) -> bool {
        record.get("is_last").and_then(Value::as_bool).unwrap_or(false)
    }

    /// The first assistant entry of the first choice carries the reply text
    pub fn parse_reply(data: Value) -> LlmResponse {
        let message = data
            .pointer("/choices/0/messages")
            .and_then(Value::as_array)
            .and_then(|messages| {
                messages
                    .iter()
                    .find(|m| m.get("role").and_then(Value::as_str) == Some("assistant"))
            })
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        LlmResponse::new(message, data.clone())
            .with_extra("model", data.get("model"))
            .with_extra("is_last", data.get("is_last"))
            .with_extra("id", data.get("id"))
            .with_extra("created", data.get("created"))
            .with_extra("object", data.get("object"))
            .with_extra("choices", data.get("choices"))
    }
}

#[async_trait]
impl SessionLifecycle for MyCityProvider {
    type Handle = MyCitySession;

    fn session(&self) -> &SessionCell<MyCitySession> {
        &self.session
    }

    async fn fetch_session_id(&self) -> Result<MyCitySession> {
        Ok(MyCitySession {
            session_uuid: Uuid::new_v4().to_string(),
            chat_uuid: Uuid::new_v4().to_string(),
        })
    }
}

#[async_trait]
impl Provider for MyCityProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "mycity"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        let session = self.authenticate().await?;
        let prompt = self.build_prompt(text);

        let payload = json!({
            "messages": [
                {"role": "tool", "content": TOOL_PREAMBLE},
                {"role": "user", "content": prompt, "index": 1},
            ],
            "sessionUUID": session.session_uuid,
            "chatUUID": session.chat_uuid,
        });

        let request = self.transport.post(CONVERSATION_PATH).json(&payload);
        let record = resolve_streamed(
            &self.name,
            self.stream_timeout,
            self.transport.body_reader(request),
            Self::is_last,
        )
        .await?;

        Ok(Self::parse_reply(record))
    }
}
