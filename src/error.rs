//! Error types for llm-wrapper

use crate::types::Message;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Network or protocol failure inside reqwest
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The request exceeded the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed chunk structure in a streamed response
    #[error("Streaming error: {0}")]
    Stream(String),

    /// The delta aggregator was driven out of order
    #[error("Aggregator error: {0}")]
    Aggregator(String),

    /// Tool-call arguments that did not parse as JSON
    #[error("Invalid arguments for tool '{tool}': {message}")]
    Schema { tool: String, message: String },

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// A local image could not be read
    #[error("Failed to read image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model kept requesting tools after the round limit was spent.
    ///
    /// `conversation` holds every turn appended up to the failure.
    #[error("Tool round limit exceeded after {rounds} rounds")]
    RecursionLimit {
        rounds: u32,
        conversation: Vec<Message>,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error from a status code and response body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Error::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new aggregator state error
    pub fn aggregator(msg: impl Into<String>) -> Self {
        Error::Aggregator(msg.into())
    }

    /// Create a new schema error for one tool call
    pub fn schema(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Schema {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Whether a caller may reasonably retry the request that produced this error.
    ///
    /// Only transport-level failures qualify: connection errors, timeouts, rate
    /// limiting and 5xx responses. The crate itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Timeout => true,
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
