//! # llm-wrapper
//!
//! A client-side adapter for OpenAI-compatible chat-completion servers, built for
//! local models:
//! - LM Studio
//! - Ollama
//! - llama.cpp
//! - vLLM
//!
//! ## Key Features
//!
//! - **Streaming Reassembly**: text, reasoning and interleaved tool calls rebuilt
//!   from arbitrarily split deltas, with identical results for blocking responses
//! - **Reasoning Separation**: `reasoning` / `reasoning_content` fields and inline
//!   `<think>...</think>` markers, even when a marker is cut across chunks
//! - **Tool Calling**: define tools with a schema and an async handler; calls are
//!   executed and fed back automatically, bounded by a round limit
//! - **Images**: remote URLs, or local files inlined as data URLs for servers that
//!   need them
//! - **Model Unloading**: optionally free LM Studio memory by unloading other models
//!
//! ## Blocking request
//!
//! ```rust,no_run
//! use llm_wrapper::{Llm, LlmOptions, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LlmOptions::builder()
//!         .model("qwen3-8b")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!     let llm = Llm::new(options)?;
//!
//!     let mut conversation = vec![Message::user("What's the capital of France?")];
//!     let result = llm.response(&mut conversation).await?;
//!
//!     println!("thought: {}", result.reasoning);
//!     println!("answer:  {}", result.answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming request
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_wrapper::{Llm, LlmOptions, Message, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LlmOptions::builder()
//!         .model("qwen3-8b")
//!         .hide_thinking(true)
//!         .build()?;
//!     let llm = Llm::new(options)?;
//!
//!     let mut stream = llm.response_stream(vec![Message::user("Tell me a joke")]).await?;
//!     while let Some(event) = stream.next().await {
//!         match event? {
//!             StreamEvent::Answer(text) => print!("{}", text),
//!             StreamEvent::ToolCall(call) => println!("\n[tool call: {}]", call.name),
//!             StreamEvent::Done => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-level pieces
//!
//! The [`DeltaAggregator`] and [`ReasoningSplitter`] are usable on their own for
//! callers that already have a chunk stream.

/// Delta aggregation state machine and batch helpers
mod aggregator;

/// The `Llm` client and `query()`
mod client;

/// Provider presets and environment lookups
mod config;

/// Error enum and `Result` alias
mod error;

/// Tool execution and the bounded tool loop
mod executor;

/// Conversation messages to wire messages, including image encoding
mod normalize;

/// Reasoning marker splitting
mod reasoning;

/// Tool definitions, schemas and the registry
mod tools;

/// Transport trait and the HTTP/SSE implementation
mod transport;

/// Options, messages, events, results and wire types
mod types;

/// LM Studio model unloading
mod unload;

/// Retry helpers with exponential backoff and jitter, for wrapping client calls
pub mod retry;

// --- Client ---

pub use client::{EventStream, Llm, query};

// --- Streaming core ---

pub use aggregator::{
    AggregatorOptions, AggregatorState, DeltaAggregator, Fragment, aggregate_batch,
    aggregate_response,
};
pub use reasoning::{ReasoningMarkers, ReasoningSplitter, Segment, split_reasoning};

// --- Tools ---

pub use executor::{
    LoopStep, ToolLoop, ToolOutcome, ToolStatus, execute_tool_call, execute_tool_calls,
};
pub use tools::{Tool, ToolBuilder, ToolHandler, ToolRegistry, ToolSpec, tool};

// --- Messages and wire format ---

pub use normalize::{encode_image_bytes, encode_image_file, to_openai_messages};
pub use types::{
    AggregateResult, ContentBlock, ImageBytesBlock, ImagePathBlock, ImageUrlBlock, LlmOptions,
    LlmOptionsBuilder, Message, MessageRole, OpenAIChoice, OpenAIChunk, OpenAIContent,
    OpenAIContentPart, OpenAIDelta, OpenAIFunction, OpenAIFunctionDelta, OpenAIImageUrl,
    OpenAIMessage, OpenAIRequest, OpenAIResponse, OpenAIResponseChoice, OpenAIResponseMessage,
    OpenAIToolCall, OpenAIToolCallDelta, StreamEvent, TextBlock, ToolArguments, ToolCall,
    ToolCallFragment, ToolResultBlock, ToolUseBlock,
};

// --- Transport and side channel ---

pub use transport::{ChunkStream, HttpTransport, Transport};
pub use unload::{LmStudioAdmin, ModelAdmin, UnloadReport, unload_other_models};

// --- Configuration ---

pub use config::{Provider, get_api_key, get_base_url, get_model};

// --- Errors ---

pub use error::{Error, Result};

/// Convenience module containing the most commonly used types and functions.
/// Import with `use llm_wrapper::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AggregateResult, ContentBlock, Error, EventStream, Llm, LlmOptions, LlmOptionsBuilder,
        Message, MessageRole, Result, StreamEvent, Tool, ToolCall, query, tool,
    };
}
