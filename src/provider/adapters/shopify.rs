//! Shopify help assistant: anonymous user plus conversation, replies polled
//! from the conversation and matched against the message that was sent

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::provider::resolve::{message_text, poll_history, MatchRule, PollConfig};
use crate::provider::session::{SessionCell, SessionLifecycle};
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const SHOPIFY_BASE_URL: &str = "https://sidekick.shopify.com";
pub const SHOPIFY_HELP_URL: &str = "https://help.shopify.com";
const MESSAGES_PATH: &str = "/api/messages";
const CONVERSATIONS_PATH: &str = "/api/conversations";
const ANONYMOUS_USER_PATH: &str = "/api/anonymous_user";
const CREATE_CONVERSATION_PATH: &str =
    "/en/search/What?_data=routes%2F%28%24locale%29._assistant.search.%24searchId";
const SEARCH_FEATURE: &str = "help/search/default";

const ANONYMOUS_USER_HEADER: &str = "x-anonymous-user-id";
const REDIRECT_HEADER: &str = "x-remix-redirect";

/// Anonymous identity plus the conversation it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopifySession {
    pub user_id: String,
    pub conversation_id: String,
}

pub struct ShopifyProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
    help_url: String,
    poll: PollConfig,
    session: SessionCell<ShopifySession>,
}

impl ShopifyProvider {
    /// `transport` must not follow redirects; conversation ids arrive in a redirect header.
    /// `help_url` hosts the conversation-creation action.
    pub fn new(
        name: impl Into<String>,
        decoration: PromptDecoration,
        transport: HttpTransport,
        help_url: impl Into<String>,
        poll: PollConfig,
    ) -> Self {
        Self {
            name: name.into(),
            decoration,
            transport,
            help_url: help_url.into().trim_end_matches('/').to_string(),
            poll,
            session: SessionCell::new(),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    async fn create_anonymous_user(&self) -> Result<String> {
        let request = self
            .transport
            .post(ANONYMOUS_USER_PATH)
            .header(ACCEPT, "application/json")
            .json(&json!({}));

        let data = self.transport.json(request).await?;
        data.get("identifier")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Internal("anonymous user response carried no identifier".to_string()))
    }

    async fn create_conversation(&self, user_id: &str) -> Result<String> {
        let url = format!("{}{}", self.help_url, CREATE_CONVERSATION_PATH);
        let form = [
            ("actionName", "createSidekickConversation"),
            ("query", ""),
            ("optimisticQuery", ""),
            ("anonymousUserId", user_id),
        ];

        let request = self
            .transport
            .post_absolute(&url)
            .header(ANONYMOUS_USER_HEADER, user_id)
            .form(&form);
        let response = self.transport.send_raw(request).await?;

        let status = response.status();
        if !matches!(status, StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::FOUND) {
            return Err(AppError::Backend {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .headers()
            .get(REDIRECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(conversation_id_from_redirect)
            .ok_or_else(|| AppError::Internal("conversation redirect header missing".to_string()))
    }

    async fn post_message(&self, session: &ShopifySession, prompt: &str) -> Result<()> {
        let payload = json!({
            "message": {
                "conversation_id": session.conversation_id,
                "content": prompt,
                "scenario": "help/search",
                "features": [SEARCH_FEATURE],
                "request_id": Uuid::new_v4().to_string(),
            }
        });

        let request = self
            .transport
            .post(MESSAGES_PATH)
            .header(ACCEPT, "text/event-stream")
            .header(ANONYMOUS_USER_HEADER, session.user_id.as_str())
            .json(&payload);

        // The reply is read from history; the event stream body is not consumed.
        self.transport.send(request).await?;
        Ok(())
    }

    async fn history(&self, session: &ShopifySession) -> Result<Vec<Value>> {
        let request = self
            .transport
            .get(&format!("{}/{}", CONVERSATIONS_PATH, session.conversation_id))
            .query(&[("features[]", SEARCH_FEATURE)])
            .header(ACCEPT, "application/json")
            .header(ANONYMOUS_USER_HEADER, session.user_id.as_str());

        let data = self.transport.json(request).await?;
        Ok(data
            .pointer("/conversation/messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Query with an explicit poll interval and timeout
    pub async fn query_with(&self, text: &str, poll: PollConfig) -> Result<LlmResponse> {
        let session = self.authenticate().await?;
        let prompt = self.build_prompt(text);

        let seen = self.history(&session).await?.len();
        self.post_message(&session, &prompt).await?;
        debug!(provider = %self.name, conversation = %session.conversation_id, seen, "Message submitted");

        let rule = MatchRule::reply_to(prompt).after(seen);
        let reply = poll_history(&self.name, poll, &rule, || self.history(&session)).await?;

        Ok(Self::parse_reply(reply))
    }

    pub fn parse_reply(data: Value) -> LlmResponse {
        let message = message_text(data.get("content"));

        LlmResponse::new(message, data.clone())
            .with_extra("id", data.get("id"))
            .with_extra("role", data.get("role"))
            .with_extra("turn_number", data.get("turn_number"))
            .with_extra("sequence_number", data.get("sequence_number"))
            .with_extra("created_at", data.get("created_at"))
            .with_extra("content", data.get("content"))
    }
}

/// Redirects look like `.../What.<conversation_id>?q=...`
fn conversation_id_from_redirect(location: &str) -> Option<String> {
    let tail = location.rsplit('.').next()?;
    let id = tail.split('?').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

#[async_trait]
impl SessionLifecycle for ShopifyProvider {
    type Handle = ShopifySession;

    fn session(&self) -> &SessionCell<ShopifySession> {
        &self.session
    }

    async fn fetch_session_id(&self) -> Result<ShopifySession> {
        let user_id = self.create_anonymous_user().await?;
        let conversation_id = self.create_conversation(&user_id).await?;

        Ok(ShopifySession {
            user_id,
            conversation_id,
        })
    }
}

#[async_trait]
impl Provider for ShopifyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "shopify"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        self.query_with(text, self.poll).await
    }
}
