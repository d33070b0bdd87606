//! HTTP transport for the chat-completions endpoint.
//!
//! Streaming responses arrive as Server-Sent Events:
//!
//! ```text
//! data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[...]}
//!
//! data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[...]}
//!
//! data: [DONE]
//! ```
//!
//! [`HttpTransport::stream`] turns that body into a stream of [`OpenAIChunk`]s,
//! ending at `[DONE]` (or when the server closes the connection). A payload of the
//! form `{"error": {...}}` becomes [`Error::Stream`].

use crate::types::{LlmOptions, OpenAIChunk, OpenAIRequest, OpenAIResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::future;
use std::pin::Pin;
use std::time::Duration;

/// Stream of parsed chunks for one streaming request
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<OpenAIChunk>> + Send>>;

/// Sends chat-completion requests.
///
/// [`HttpTransport`] is the real implementation; tests and embedders can supply
/// their own through [`Llm::with_transport`](crate::Llm::with_transport).
#[async_trait]
pub trait Transport: Send + Sync {
    /// One non-streaming completion
    async fn complete(&self, request: &OpenAIRequest) -> Result<OpenAIResponse>;

    /// One streaming completion
    async fn stream(&self, request: &OpenAIRequest) -> Result<ChunkStream>;
}

/// reqwest-backed transport for any OpenAI-compatible server
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_options(options: &LlmOptions) -> Result<Self> {
        Self::new(
            &options.base_url,
            &options.api_key,
            Duration::from_secs(options.timeout),
        )
    }

    async fn post(&self, request: &OpenAIRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        log::debug!(
            "POST {} (model={}, messages={}, stream={})",
            url,
            request.model,
            request.messages.len(),
            request.stream
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("Failed to read error response body: {}", e);
                String::new()
            });
            return Err(Error::api(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn complete(&self, request: &OpenAIRequest) -> Result<OpenAIResponse> {
        let response = self.post(request).await?;
        let body = response.text().await.map_err(map_reqwest_error)?;
        if let Some(message) = error_payload(&body) {
            return Err(Error::stream(message));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn stream(&self, request: &OpenAIRequest) -> Result<ChunkStream> {
        let response = self.post(request).await?;
        Ok(parse_sse_stream(response))
    }
}

/// Parse an SSE response body into chunks
fn parse_sse_stream(response: reqwest::Response) -> ChunkStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .take_while(|event| {
            future::ready(!matches!(event, Ok(event) if event.data.trim() == "[DONE]"))
        })
        .filter_map(|event| {
            future::ready(match event {
                Ok(event) => parse_chunk(&event.data).transpose(),
                Err(EventStreamError::Transport(e)) => Some(Err(map_reqwest_error(e))),
                Err(e) => Some(Err(Error::stream(e.to_string()))),
            })
        });
    Box::pin(stream)
}

/// Parse one SSE data payload; blank payloads are skipped
pub(crate) fn parse_chunk(data: &str) -> Result<Option<OpenAIChunk>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(data)
        .map_err(|e| Error::stream(format!("Failed to parse chunk: {}", e)))?;
    if let Some(message) = error_message(&value) {
        return Err(Error::stream(message));
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::stream(format!("Malformed chunk: {}", e)))
}

fn error_payload(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| error_message(&value))
}

fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|e| !e.is_null())?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(format!("Server reported an error: {}", message))
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(e)
    }
}
