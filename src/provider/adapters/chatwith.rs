//! ChatWith adapter: locally generated session id, plain-text replies

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::provider::session::{SessionCell, SessionLifecycle};
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const CHATWITH_BASE_URL: &str = "https://api0.chatwith.tools";
const CHAT_PATH: &str = "/chat";

pub struct ChatWithProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
    chatbot_id: String,
    session: SessionCell<String>,
}

impl ChatWithProvider {
    pub fn new(
        name: impl Into<String>,
        decoration: PromptDecoration,
        transport: HttpTransport,
        chatbot_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            decoration,
            transport,
            chatbot_id: chatbot_id.into(),
            session: SessionCell::new(),
        }
    }

    /// Resume `session_id` instead of generating a new one
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session = SessionCell::preset(session_id.into());
        self
    }
}

#[async_trait]
impl SessionLifecycle for ChatWithProvider {
    type Handle = String;

    fn session(&self) -> &SessionCell<String> {
        &self.session
    }

    async fn fetch_session_id(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl Provider for ChatWithProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "chatwith"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        let session_id = self.authenticate().await?;
        let prompt = self.build_prompt(text);

        let payload = json!({
            "id": session_id,
            "messages": [{"role": "user", "content": prompt}],
            "chatbotId": self.chatbot_id,
            "sessionContext": {},
        });

        let reply = self
            .transport
            .text(self.transport.post(CHAT_PATH).json(&payload))
            .await?;

        Ok(LlmResponse::new(reply.clone(), json!({ "message": reply })))
    }
}
