//! AT&T support search adapter: direct replies with embedded answer documents

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::provider::resolve::resolve_direct;
use crate::provider::traits::{LlmResponse, Provider, PromptDecoration};
use crate::provider::transport::HttpTransport;

pub const ATT_BASE_URL: &str = "https://services.att.com";
const ANSWER_PATH: &str = "/search/v2/answerextraction";

const FIXED_PARAMS: [(&str, &str); 10] = [
    ("app-id", "idpSupport"),
    ("includeDatasources", "search"),
    ("isRelatedQnAEnabled", "true"),
    ("isCallLLM", "true"),
    ("gptVersion", "gpt-4o"),
    ("genAIclick", "true"),
    ("callSpectra", "true"),
    ("navigationTree", "\"~Support~\",\"~Support~All~\""),
    ("sourcePage", "/support/contact-us/"),
    ("responseSignal", "true"),
];

pub struct AttProvider {
    name: String,
    decoration: PromptDecoration,
    transport: HttpTransport,
}

impl AttProvider {
    pub fn new(name: impl Into<String>, decoration: PromptDecoration, transport: HttpTransport) -> Self {
        Self {
            name: name.into(),
            decoration,
            transport,
        }
    }

    /// Extract the answer from the first returned document.
    ///
    /// The document's `answer` is usually a JSON object encoded as a string;
    /// anything undecodable is treated as the answer text itself.
    pub fn parse_reply(data: Value) -> LlmResponse {
        let Some(doc) = data.pointer("/response/docs/0") else {
            return LlmResponse::new("", data);
        };

        let parsed = match doc.get("answer") {
            Some(Value::String(text)) => {
                serde_json::from_str::<Value>(text).unwrap_or_else(|_| json!({ "answer": text }))
            }
            Some(other) => other.clone(),
            None => Value::Null,
        };

        let message = parsed
            .get("answer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let citations = parsed.get("articles").cloned().unwrap_or_else(|| json!([]));

        LlmResponse::new(message, data.clone())
            .with_extra("question", parsed.get("question"))
            .with_extra("score", parsed.get("score"))
            .with_extra("citations", Some(&citations))
    }
}

#[async_trait]
impl Provider for AttProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &str {
        "att"
    }

    fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    async fn query(&self, text: &str) -> Result<LlmResponse> {
        let prompt = self.build_prompt(text);

        let request = self
            .transport
            .get(ANSWER_PATH)
            .query(&FIXED_PARAMS)
            .query(&[("searchTerm", prompt.as_str())]);

        let data = resolve_direct(&self.transport, request).await?;
        Ok(Self::parse_reply(data))
    }
}
