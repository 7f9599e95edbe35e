//! HTTP transport shared by all calls issued through one provider instance

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{redirect, Client, ClientBuilder, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Buffered reader over a streaming response body
pub type BodyReader = StreamReader<BoxStream<'static, std::io::Result<Bytes>>, Bytes>;

/// Connection pool plus endpoint root for one provider
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport that follows redirects
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::build(base_url.into(), timeout, redirect::Policy::default())
    }

    /// Create a transport that hands redirect responses back to the caller
    pub fn without_redirects(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::build(base_url.into(), timeout, redirect::Policy::none())
    }

    /// Create a transport for long-lived response bodies; only connecting is bounded,
    /// the caller owns the overall deadline
    pub fn streaming(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        Self::from_builder(
            base_url.into(),
            Client::builder().connect_timeout(connect_timeout),
        )
    }

    fn build(base_url: String, timeout: Duration, policy: redirect::Policy) -> Result<Self> {
        Self::from_builder(base_url, Client::builder().timeout(timeout).redirect(policy))
    }

    fn from_builder(base_url: String, builder: ClientBuilder) -> Result<Self> {
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Request to an absolute URL outside the provider's root
    pub fn post_absolute(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send without checking the status
    pub async fn send_raw(&self, request: RequestBuilder) -> Result<Response> {
        Ok(request.send().await?)
    }

    /// Send and fail with a backend error on any non-success status
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(url = %response.url(), status = %status, "Request succeeded");
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::Backend {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Send and decode the body as JSON; an undecodable body degrades to `null`
    pub async fn json(&self, request: RequestBuilder) -> Result<Value> {
        let text = self.send(request).await?.text().await?;
        Ok(parse_lenient(&text))
    }

    /// Send and return the body as text
    pub async fn text(&self, request: RequestBuilder) -> Result<String> {
        Ok(self.send(request).await?.text().await?)
    }

    /// Send and expose the body as a line-readable stream
    pub async fn body_reader(&self, request: RequestBuilder) -> Result<BodyReader> {
        let response = self.send(request).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();

        Ok(StreamReader::new(stream))
    }
}

/// Decode JSON, logging and substituting `null` when the payload is malformed
pub fn parse_lenient(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Provider returned malformed JSON");
            Value::Null
        }
    }
}
