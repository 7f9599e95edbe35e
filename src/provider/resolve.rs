//! Reply resolution strategies used inside provider queries
//!
//! - Direct: a single request whose JSON body is the reply.
//! - Polled: the message is submitted, then a history endpoint is re-read until
//!   a [`MatchRule`] recognizes the reply or the [`PollConfig`] timeout expires.
//! - Streamed: newline-delimited JSON records are read from one response until
//!   a record flagged as final arrives. Records are snapshots, not deltas.

use reqwest::RequestBuilder;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::provider::transport::HttpTransport;

/// Single request, single JSON payload
pub async fn resolve_direct(transport: &HttpTransport, request: RequestBuilder) -> Result<Value> {
    transport.json(request).await
}

/// Interval and overall bound for polled resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }
}

/// Decides whether a history snapshot contains the awaited reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// The newest entry carries the assistant role
    LastWithRole { role: String },
    /// Scanning from the newest entry, a user entry whose text equals `sent`
    /// immediately followed by an assistant entry.
    ///
    /// The first `skip` entries are ignored, so an earlier exchange with the
    /// same text in the conversation is never mistaken for the reply.
    ReplyTo {
        user_role: String,
        assistant_role: String,
        sent: String,
        skip: usize,
    },
}

impl MatchRule {
    pub fn last_with_role(role: impl Into<String>) -> Self {
        MatchRule::LastWithRole { role: role.into() }
    }

    pub fn reply_to(sent: impl Into<String>) -> Self {
        MatchRule::ReplyTo {
            user_role: "user".to_string(),
            assistant_role: "assistant".to_string(),
            sent: sent.into(),
            skip: 0,
        }
    }

    /// Only consider entries past the first `seen` of the history
    pub fn after(self, seen: usize) -> Self {
        match self {
            MatchRule::ReplyTo {
                user_role,
                assistant_role,
                sent,
                ..
            } => MatchRule::ReplyTo {
                user_role,
                assistant_role,
                sent,
                skip: seen,
            },
            other => other,
        }
    }

    pub fn find(&self, messages: &[Value]) -> Option<Value> {
        match self {
            MatchRule::LastWithRole { role } => messages
                .last()
                .filter(|m| role_of(m) == Some(role.as_str()))
                .cloned(),
            MatchRule::ReplyTo {
                user_role,
                assistant_role,
                sent,
                skip,
            } => messages
                .get(*skip..)
                .unwrap_or_default()
                .windows(2)
                .rev()
                .find(|pair| {
                    role_of(&pair[0]) == Some(user_role.as_str())
                        && message_text(pair[0].get("content")) == *sent
                        && role_of(&pair[1]) == Some(assistant_role.as_str())
                })
                .map(|pair| pair[1].clone()),
        }
    }
}

fn role_of(message: &Value) -> Option<&str> {
    message.get("role").and_then(Value::as_str)
}

/// Text of a message `content` that is either a string or a list of rich blocks
pub fn message_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .first()
            .and_then(|block| block.get("markdown").or_else(|| block.get("text")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Re-read history via `fetch` until `rule` matches or `config.timeout` elapses.
///
/// `fetch` returns the current list of history entries. The timeout is measured
/// from the first fetch; an in-flight fetch is abandoned when it expires.
pub async fn poll_history<F, Fut>(
    provider: &str,
    config: PollConfig,
    rule: &MatchRule,
    mut fetch: F,
) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    let outcome = tokio::time::timeout(
        config.timeout,
        poll_loop(config.interval, rule, &mut fetch, &mut attempts),
    )
    .await;

    match outcome {
        Ok(result) => {
            debug!(provider = %provider, attempts, elapsed = ?started.elapsed(), "Poll finished");
            result
        }
        Err(_) => {
            warn!(provider = %provider, attempts, "Timed out waiting for reply");
            Err(AppError::ResolutionTimeout {
                provider: provider.to_string(),
                waited: config.timeout,
            })
        }
    }
}

async fn poll_loop<F, Fut>(
    interval: Duration,
    rule: &MatchRule,
    fetch: &mut F,
    attempts: &mut u32,
) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    loop {
        *attempts += 1;
        let messages = fetch().await?;
        if let Some(found) = rule.find(&messages) {
            return Ok(found);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Read line-delimited JSON records and return the first one `is_final` accepts
pub async fn read_final_record<R, P>(provider: &str, reader: R, is_final: P) -> Result<Value>
where
    R: AsyncBufRead + Unpin,
    P: Fn(&Value) -> bool,
{
    let mut lines = reader.lines();
    let mut discarded = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Skipping undecodable stream record");
                continue;
            }
        };

        if is_final(&record) {
            debug!(provider = %provider, discarded, "Received final stream record");
            return Ok(record);
        }
        discarded += 1;
    }

    Err(AppError::MissingTerminalResponse {
        provider: provider.to_string(),
    })
}

/// Open a stream via `open` and read it to its final record.
///
/// One `timeout` covers waiting for the response head and reading the body, so a
/// slow backend always surfaces as [`AppError::ResolutionTimeout`].
pub async fn resolve_streamed<O, R, P>(
    provider: &str,
    timeout: Duration,
    open: O,
    is_final: P,
) -> Result<Value>
where
    O: Future<Output = Result<R>>,
    R: AsyncBufRead + Unpin,
    P: Fn(&Value) -> bool,
{
    match tokio::time::timeout(timeout, open_and_read(provider, open, is_final)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(provider = %provider, waited = ?timeout, "Timed out waiting for final stream record");
            Err(AppError::ResolutionTimeout {
                provider: provider.to_string(),
                waited: timeout,
            })
        }
    }
}

async fn open_and_read<O, R, P>(provider: &str, open: O, is_final: P) -> Result<Value>
where
    O: Future<Output = Result<R>>,
    R: AsyncBufRead + Unpin,
    P: Fn(&Value) -> bool,
{
    let reader = open.await?;
    read_final_record(provider, reader, is_final).await
}
