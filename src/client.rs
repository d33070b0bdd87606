//! The [`Llm`] client and the [`query()`] convenience function.
//!
//! # Request flow
//!
//! ```text
//! messages ──▶ to_openai_messages() ──▶ OpenAIRequest ──▶ Transport
//!                                                            │
//!                   ┌─────────────── chunks / response ◀─────┘
//!                   ▼
//!            DeltaAggregator ──▶ StreamEvents ... AggregateResult
//!                                                    │
//!                                         ToolLoop::advance()
//!                                       Continue │        │ Finished
//!                       (append turns, request again)    ▼
//!                                                 result / Final + Done
//! ```
//!
//! # Examples
//!
//! ## Blocking, with tools
//!
//! ```rust,no_run
//! use llm_wrapper::{Llm, LlmOptions, Message, tool};
//! use serde_json::json;
//!
//! # async fn example() -> llm_wrapper::Result<()> {
//! let add = tool("add", "Add two numbers")
//!     .param("a", "number")
//!     .param("b", "number")
//!     .build(|args| async move {
//!         Ok(json!(args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0)))
//!     });
//!
//! let options = LlmOptions::builder()
//!     .model("qwen3-8b")
//!     .tool(add)
//!     .build()?;
//! let llm = Llm::new(options)?;
//!
//! let mut conversation = vec![Message::user("What is 17 + 25?")];
//! let result = llm.response(&mut conversation).await?;
//! println!("{}", result.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_wrapper::{Llm, LlmOptions, Message, StreamEvent};
//!
//! # async fn example() -> llm_wrapper::Result<()> {
//! let llm = Llm::new(LlmOptions::builder().model("qwen3-8b").build()?)?;
//! let mut stream = llm.response_stream(vec![Message::user("Why is the sky blue?")]).await?;
//!
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         StreamEvent::Reasoning(text) => eprint!("{}", text),
//!         StreamEvent::Answer(text) => print!("{}", text),
//!         StreamEvent::Done => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::aggregator::{AggregatorOptions, DeltaAggregator, aggregate_response};
use crate::executor::{LoopStep, ToolLoop, ToolOutcome};
use crate::normalize::to_openai_messages;
use crate::transport::{ChunkStream, HttpTransport, Transport};
use crate::types::{AggregateResult, LlmOptions, Message, OpenAIRequest, StreamEvent};
use crate::unload::{LmStudioAdmin, ModelAdmin, UnloadReport, unload_other_models};
use crate::Result;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

/// Stream of typed events for one request, terminated by [`StreamEvent::Done`]
/// or by a single error.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Client for one model on one OpenAI-compatible server.
///
/// Cloning is cheap; clones share the transport and options.
#[derive(Clone)]
pub struct Llm {
    options: Arc<LlmOptions>,
    transport: Arc<dyn Transport>,
    admin: Option<Arc<dyn ModelAdmin>>,
}

impl std::fmt::Debug for Llm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Llm")
            .field("options", &self.options)
            .field("model_admin", &self.admin.is_some())
            .finish()
    }
}

impl Llm {
    /// Create a client talking HTTP to `options.base_url`
    pub fn new(options: LlmOptions) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_options(&options)?);
        let admin: Option<Arc<dyn ModelAdmin>> = if options.unload_other_models {
            Some(Arc::new(LmStudioAdmin::from_options(&options)?))
        } else {
            None
        };
        Ok(Self {
            options: Arc::new(options),
            transport,
            admin,
        })
    }

    /// Create a client over a custom transport
    pub fn with_transport(options: LlmOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            options: Arc::new(options),
            transport,
            admin: None,
        }
    }

    /// Replace the model-management side channel used by `unload_other_models`
    pub fn with_model_admin(mut self, admin: Arc<dyn ModelAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn options(&self) -> &LlmOptions {
        &self.options
    }

    /// One non-streaming turn. Tool calls are returned, never executed.
    pub async fn complete(&self, messages: &[Message]) -> Result<AggregateResult> {
        self.prepare().await;
        self.complete_turn(messages).await
    }

    /// Non-streaming request with automatic tool execution.
    ///
    /// The assistant turns and tool results are appended to `conversation`, so it
    /// can be passed back for the next user message.
    ///
    /// # Errors
    ///
    /// Transport and normalization errors, plus
    /// [`Error::RecursionLimit`](crate::Error::RecursionLimit) and
    /// [`Error::Tool`](crate::Error::Tool) from the tool loop.
    pub async fn response(&self, conversation: &mut Vec<Message>) -> Result<AggregateResult> {
        self.prepare().await;
        let mut tool_loop = ToolLoop::from_options(&self.options);
        loop {
            let result = self.complete_turn(conversation).await?;
            match tool_loop
                .advance(&self.options.tools, conversation, &result)
                .await?
            {
                LoopStep::Finished => return Ok(result),
                LoopStep::Continue(_) => continue,
            }
        }
    }

    /// Streaming request with automatic tool execution.
    ///
    /// The first request is sent before this returns, so connection and HTTP
    /// errors surface here. The stream yields events as they are decoded,
    /// `ToolResult` events between rounds, `Conversation` and `Final` (when
    /// `emit_final` is on) and then `Done`. An error ends the stream. Dropping it
    /// abandons the request.
    pub async fn response_stream(&self, messages: Vec<Message>) -> Result<EventStream> {
        self.prepare().await;
        let request = self.build_request(&messages, true)?;
        let chunks = self.transport.stream(&request).await?;

        let state = TurnStream {
            llm: self.clone(),
            conversation: messages,
            tool_loop: ToolLoop::from_options(&self.options),
            chunks: Some(chunks),
            aggregator: DeltaAggregator::new(AggregatorOptions::from(&*self.options)),
            pending: VecDeque::new(),
            finished: false,
        };
        Ok(Box::pin(stream::unfold(state, next_event)))
    }

    /// Run the unload step if enabled. `None` means nothing was unloaded.
    async fn prepare(&self) -> Option<UnloadReport> {
        if !self.options.unload_other_models {
            return None;
        }
        let Some(admin) = &self.admin else {
            log::warn!(
                "unload_other_models is enabled but no model admin is configured; skipping unload"
            );
            return None;
        };
        let report = unload_other_models(admin.as_ref(), &self.options.model).await;
        log::debug!(
            "Unloaded {} other models ({} failures)",
            report.unloaded.len(),
            report.failures.len()
        );
        Some(report)
    }

    async fn complete_turn(&self, messages: &[Message]) -> Result<AggregateResult> {
        let request = self.build_request(messages, false)?;
        let response = self.transport.complete(&request).await?;
        aggregate_response(response, AggregatorOptions::from(&*self.options))
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> Result<OpenAIRequest> {
        let options = &self.options;
        let tools = (!options.tools.is_empty()).then(|| options.tools.to_openai_format());
        Ok(OpenAIRequest {
            model: options.model.clone(),
            messages: to_openai_messages(&options.system_prompt, messages, options.vllm_mode)?,
            stream,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools,
            response_format: options.response_format.clone(),
        })
    }
}

/// State carried between polls of a response stream
struct TurnStream {
    llm: Llm,
    conversation: Vec<Message>,
    tool_loop: ToolLoop,
    chunks: Option<ChunkStream>,
    aggregator: DeltaAggregator,
    pending: VecDeque<Result<StreamEvent>>,
    finished: bool,
}

async fn next_event(mut state: TurnStream) -> Option<(Result<StreamEvent>, TurnStream)> {
    loop {
        if let Some(item) = state.pending.pop_front() {
            return Some((item, state));
        }
        if state.finished {
            return None;
        }
        if let Err(e) = state.step().await {
            state.finished = true;
            state.chunks = None;
            state.pending.push_back(Err(e));
        }
    }
}

impl TurnStream {
    /// Pull one chunk, or finish the turn when the body ends
    async fn step(&mut self) -> Result<()> {
        let Some(chunks) = self.chunks.as_mut() else {
            self.finished = true;
            return Ok(());
        };

        if let Some(chunk) = chunks.next().await {
            let events = self.aggregator.push_chunk(chunk?)?;
            self.pending.extend(events.into_iter().map(Ok));
            return Ok(());
        }

        self.chunks = None;
        let (events, result) = self.aggregator.finish()?;
        self.pending.extend(events.into_iter().map(Ok));

        let step = self
            .tool_loop
            .advance(&self.llm.options.tools, &mut self.conversation, &result)
            .await?;
        match step {
            LoopStep::Continue(outcomes) => {
                self.pending
                    .extend(outcomes.iter().map(ToolOutcome::to_event).map(Ok));
                let request = self.llm.build_request(&self.conversation, true)?;
                self.chunks = Some(self.llm.transport.stream(&request).await?);
                self.aggregator =
                    DeltaAggregator::new(AggregatorOptions::from(&*self.llm.options));
            }
            LoopStep::Finished => {
                if self.llm.options.emit_final {
                    let conversation = std::mem::take(&mut self.conversation);
                    self.pending
                        .push_back(Ok(StreamEvent::Conversation(conversation)));
                    self.pending.push_back(Ok(StreamEvent::Final(result)));
                }
                self.pending.push_back(Ok(StreamEvent::Done));
                self.finished = true;
            }
        }
        Ok(())
    }
}

/// One-shot request with automatic tool execution
///
/// ```rust,no_run
/// use llm_wrapper::{LlmOptions, query};
///
/// # async fn example() -> llm_wrapper::Result<()> {
/// let options = LlmOptions::builder().model("qwen3-8b").build()?;
/// let result = query("Name three prime numbers", &options).await?;
/// println!("{}", result.answer);
/// # Ok(())
/// # }
/// ```
pub async fn query(prompt: &str, options: &LlmOptions) -> Result<AggregateResult> {
    let llm = Llm::new(options.clone())?;
    let mut conversation = vec![Message::user(prompt)];
    llm.response(&mut conversation).await
}
