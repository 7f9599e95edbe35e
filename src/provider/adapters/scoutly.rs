//! Scoutly adapter: direct JSON replies, client-side conversation history

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::provider::resolve::resolve_direct;
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const SCOUTLY_BASE_URL: &str = "https://scoutly.scouting.org";
const CHAT_PATH: &str = "/api/chat2";
const SYSTEM_ACK: &str = "@system, Understood.";

/// One entry of the history Scoutly expects with every question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoutlyHistoryItem {
    pub role: String,
    pub content: String,
    pub answer: String,
}

impl ScoutlyHistoryItem {
    pub fn new(role: &str, content: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            answer: answer.into(),
        }
    }
}

pub struct ScoutlyProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
    session: String,
    language: String,
    history: Mutex<Vec<ScoutlyHistoryItem>>,
}

impl ScoutlyProvider {
    /// `session` defaults to a fresh identifier for this instance
    pub fn new(
        name: impl Into<String>,
        decoration: PromptDecoration,
        transport: HttpTransport,
        language: impl Into<String>,
        session: Option<String>,
        initial_prompt: &str,
    ) -> Self {
        let mut history = Vec::new();
        if !initial_prompt.is_empty() {
            history.push(ScoutlyHistoryItem::new("system", initial_prompt, SYSTEM_ACK));
        }

        Self {
            name: name.into(),
            decoration,
            transport,
            session: session.unwrap_or_else(|| Uuid::new_v4().to_string()),
            language: language.into(),
            history: Mutex::new(history),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Append prior exchanges sent along with later questions
    pub fn load_history(&self, items: impl IntoIterator<Item = ScoutlyHistoryItem>) {
        self.history.lock().extend(items);
    }

    pub fn history(&self) -> Vec<ScoutlyHistoryItem> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl Provider for ScoutlyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "scoutly"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        let question = self.build_prompt(text);

        let (user_index, history) = {
            let mut history = self.history.lock();
            history.push(ScoutlyHistoryItem::new("user", question.as_str(), ""));
            (history.len() - 1, history.clone())
        };

        let payload = json!({
            "question": question,
            "language": self.language,
            "session": self.session,
            "history": history,
        });

        debug!(provider = %self.name, history = history.len(), "Sending question");
        let data = resolve_direct(&self.transport, self.transport.post(CHAT_PATH).json(&payload))
            .await?;

        let answer = data
            .get("answer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        {
            let mut history = self.history.lock();
            if let Some(item) = history.get_mut(user_index) {
                item.answer = answer.clone();
            }
            history.push(ScoutlyHistoryItem::new("assistant", question, answer.as_str()));
        }

        Ok(LlmResponse::new(answer, data))
    }
}
