//! Decagon-hosted support bots: replies are polled from conversation history
//!
//! Every company on the platform shares the same API; a tenant is identified
//! by its team id and flow id.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::provider::resolve::{poll_history, MatchRule, PollConfig};
use crate::provider::session::{SessionCell, SessionLifecycle};
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const DECAGON_BASE_URL: &str = "https://api.decagon.ai";
const DECAGON_SITE: &str = "https://decagon.ai";
const ANONYMOUS_USER_PREFIX: &str = "decagon_anonymous_";
const ASSISTANT_ROLE: &str = "AI";

/// Static tenant settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecagonTenant {
    pub team_id: String,
    pub flow_id: String,
    pub metadata_url: String,
    pub timezone: String,
}

pub struct DecagonProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
    tenant: DecagonTenant,
    user_id: String,
    headers: HeaderMap,
    poll: PollConfig,
    session: SessionCell<String>,
}

impl DecagonProvider {
    pub fn new(
        name: impl Into<String>,
        decoration: PromptDecoration,
        transport: HttpTransport,
        tenant: DecagonTenant,
        poll: PollConfig,
    ) -> Result<Self> {
        let user_id = format!("{}{}", ANONYMOUS_USER_PREFIX, Uuid::new_v4());
        let headers = Self::build_headers(&tenant.team_id, &user_id)?;

        Ok(Self {
            name: name.into(),
            decoration,
            transport,
            tenant,
            user_id,
            headers,
            poll,
            session: SessionCell::new(),
        })
    }

    /// Post into an existing conversation instead of opening one
    pub fn with_session(mut self, conversation_id: impl Into<String>) -> Self {
        self.session = SessionCell::preset(conversation_id.into());
        self
    }

    fn build_headers(team_id: &str, user_id: &str) -> Result<HeaderMap> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            AppError::Internal(format!("Invalid Decagon header value: {}", e))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(ORIGIN, HeaderValue::from_static(DECAGON_SITE));
        headers.insert(REFERER, HeaderValue::from_static(DECAGON_SITE));
        headers.insert(
            HeaderName::from_static("x-decagon-auth-team-id"),
            HeaderValue::from_str(team_id).map_err(invalid)?,
        );
        headers.insert(
            HeaderName::from_static("x-decagon-auth-user-id"),
            HeaderValue::from_str(user_id).map_err(invalid)?,
        );
        Ok(headers)
    }

    /// Anonymous user id sent with every request from this instance
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    fn metadata(&self) -> Value {
        json!({
            "flow_id": self.tenant.flow_id,
            "metadata": {
                "url": self.tenant.metadata_url,
                "user_device": "",
                "widget_location": "",
                "timezone": self.tenant.timezone,
                "user_browser": "",
            }
        })
    }

    async fn history(&self, conversation_id: &str) -> Result<Vec<Value>> {
        let request = self
            .transport
            .get("/conversation/history")
            .headers(self.headers.clone())
            .query(&[
                ("conversation_id", conversation_id),
                ("trigger_message", ""),
                ("user_type", "user"),
            ]);

        let history = self.transport.json(request).await?;
        Ok(history
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Query with an explicit poll interval and timeout
    pub async fn query_with(&self, text: &str, poll: PollConfig) -> Result<LlmResponse> {
        let conversation_id = self.authenticate().await?;
        let prompt = self.build_prompt(text);

        let mut payload = self.metadata();
        payload["type"] = json!("chat_message");
        payload["text"] = json!(prompt);

        let request = self
            .transport
            .post(&format!("/chat/{}/message", conversation_id))
            .headers(self.headers.clone())
            .json(&payload);
        self.transport.send(request).await?;
        debug!(provider = %self.name, conversation = %conversation_id, "Message submitted");

        let rule = MatchRule::last_with_role(ASSISTANT_ROLE);
        let reply = poll_history(&self.name, poll, &rule, || self.history(&conversation_id)).await?;

        Ok(Self::parse_reply(reply))
    }

    pub fn parse_reply(data: Value) -> LlmResponse {
        let message = data
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        LlmResponse::new(message, data.clone())
            .with_extra("id", data.get("id"))
            .with_extra("role", data.get("role"))
    }
}

#[async_trait]
impl SessionLifecycle for DecagonProvider {
    type Handle = String;

    fn session(&self) -> &SessionCell<String> {
        &self.session
    }

    /// Decagon calls sessions "conversations" and creates them remotely
    async fn fetch_session_id(&self) -> Result<String> {
        let request = self
            .transport
            .post("/conversation/new")
            .headers(self.headers.clone())
            .json(&self.metadata());

        let data = self.transport.json(request).await?;
        data.get("conversation_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Internal("response carried no conversation_id".to_string()))
    }
}

#[async_trait]
impl Provider for DecagonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "decagon"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        self.query_with(text, self.poll).await
    }
}
