//! Reassembly of streamed deltas into typed events and a final aggregate.
//!
//! A chat-completion stream delivers its answer in pieces. Text, reasoning and tool
//! calls all arrive as deltas, and tool calls are the awkward ones: several calls
//! can be in flight at once, each identified by an `index`, and their JSON
//! arguments are cut at arbitrary byte positions:
//!
//! ```text
//! Chunk 1: { tool_calls: [{ index: 0, id: "call_1", function: { name: "add" } }] }
//! Chunk 2: { tool_calls: [{ index: 1, id: "call_2", function: { name: "sub", arguments: "{\"a\":5,\"b\":1}" } }] }
//! Chunk 3: { tool_calls: [{ index: 0, function: { arguments: "{\"a\":1" } }] }
//! Chunk 4: { tool_calls: [{ index: 0, function: { arguments: ",\"b\":2}" } }] }
//! data: [DONE]
//! ```
//!
//! [`DeltaAggregator`] consumes those deltas in arrival order and moves through
//! four states:
//!
//! ```text
//! Idle ──first fragment──▶ Streaming ──finish()──▶ Finalizing ──▶ Done
//! ```
//!
//! While streaming, every fragment yields zero or more [`StreamEvent`]s right away.
//! `finish()` is the explicit end-of-stream signal: only then are argument buffers
//! parsed and the [`AggregateResult`] built. A call whose arguments fail to parse
//! is kept as [`ToolArguments::Invalid`](crate::ToolArguments::Invalid) and does not
//! disturb the other calls or the text fields. After `Done` the instance is inert:
//! further input or a second `finish()` is an error.
//!
//! Non-streaming responses go through the same machine as a single batch
//! ([`aggregate_response`]), so both paths produce identical results for the same
//! content.

use crate::reasoning::{ReasoningMarkers, ReasoningSplitter, Segment};
use crate::types::{
    AggregateResult, LlmOptions, OpenAIChunk, OpenAIResponse, StreamEvent, ToolCall,
    ToolCallFragment, pick_reasoning,
};
use crate::{Error, Result};
use std::collections::HashMap;

/// One incremental input to the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Content text, possibly carrying inline reasoning markers
    Content(String),
    /// Reasoning delivered in a dedicated field (`reasoning` / `reasoning_content`)
    Reasoning(String),
    /// A piece of one tool call
    ToolCall(ToolCallFragment),
}

/// Lifecycle of a [`DeltaAggregator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Streaming,
    Finalizing,
    Done,
}

/// Behaviour switches for aggregation
#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    /// Suppress `Reasoning` events; reasoning is still collected
    pub hide_thinking: bool,
    pub markers: ReasoningMarkers,
}

impl From<&LlmOptions> for AggregatorOptions {
    fn from(options: &LlmOptions) -> Self {
        Self {
            hide_thinking: options.hide_thinking,
            markers: options.reasoning_markers.clone(),
        }
    }
}

/// A tool call being assembled from fragments.
///
/// ```text
/// Initial state:     { id: None,           name: None,        arguments: "" }
/// After fragment 1:  { id: Some("call_1"), name: Some("add"), arguments: "" }
/// After fragment 2:  { id: Some("call_1"), name: Some("add"), arguments: "{\"a\":1" }
/// After fragment 3:  { id: Some("call_1"), name: Some("add"), arguments: "{\"a\":1,\"b\":2}" }
/// ```
#[derive(Debug)]
struct PartialToolCall {
    index: u32,
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Stateful reassembler for one response. See the [module docs](self).
#[derive(Debug)]
pub struct DeltaAggregator {
    state: AggregatorState,
    hide_thinking: bool,
    splitter: ReasoningSplitter,
    answer: String,
    reasoning: String,
    /// Calls in first-seen order
    tool_calls: Vec<PartialToolCall>,
    /// index → position in `tool_calls`
    slots: HashMap<u32, usize>,
    /// id → index, for servers that omit `index` on deltas
    ids: HashMap<String, u32>,
    finish_reason: Option<String>,
}

impl Default for DeltaAggregator {
    fn default() -> Self {
        Self::new(AggregatorOptions::default())
    }
}

impl DeltaAggregator {
    pub fn new(options: AggregatorOptions) -> Self {
        Self {
            state: AggregatorState::Idle,
            hide_thinking: options.hide_thinking,
            splitter: ReasoningSplitter::new(options.markers),
            answer: String::new(),
            reasoning: String::new(),
            tool_calls: Vec::new(),
            slots: HashMap::new(),
            ids: HashMap::new(),
            finish_reason: None,
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Accumulate one fragment and return the events it produced.
    ///
    /// Empty fragments are accepted and produce nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Aggregator`] once [`finish`](Self::finish) has been called.
    pub fn push(&mut self, fragment: Fragment) -> Result<Vec<StreamEvent>> {
        self.ensure_open()?;
        self.state = AggregatorState::Streaming;

        let mut events = Vec::new();
        match fragment {
            Fragment::Content(text) => {
                for segment in self.splitter.push(&text) {
                    self.route(segment, &mut events);
                }
            }
            Fragment::Reasoning(text) => {
                self.route(Segment::Reasoning(text), &mut events);
            }
            Fragment::ToolCall(fragment) => {
                if !fragment.is_empty() {
                    self.merge_tool_call(&fragment);
                    events.push(StreamEvent::ToolCallDelta(fragment));
                }
            }
        }
        Ok(events)
    }

    /// Accumulate a wire-level streaming chunk.
    ///
    /// Only the first choice is read. Chunks without choices (usage reports) are
    /// ignored. A `finish_reason` is recorded but does not end the stream.
    ///
    /// # Errors
    ///
    /// [`Error::Aggregator`] after `finish()`, [`Error::Stream`] for a tool-call
    /// delta that cannot be attributed to any call.
    pub fn push_chunk(&mut self, chunk: OpenAIChunk) -> Result<Vec<StreamEvent>> {
        self.ensure_open()?;

        let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        let delta = choice.delta;

        if let Some(reasoning) = pick_reasoning(&delta.reasoning_content, &delta.reasoning) {
            events.extend(self.push(Fragment::Reasoning(reasoning.to_string()))?);
        }

        if let Some(content) = delta.content {
            events.extend(self.push(Fragment::Content(content))?);
        }

        for tool_call in delta.tool_calls.unwrap_or_default() {
            let index = self.resolve_index(tool_call.index, tool_call.id.as_deref())?;
            let (name, arguments) = match tool_call.function {
                Some(function) => (function.name, function.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            events.extend(self.push(Fragment::ToolCall(ToolCallFragment {
                index,
                id: tool_call.id,
                name,
                arguments,
            }))?);
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }

        Ok(events)
    }

    /// End of stream: flush held text, parse tool-call arguments, build the result.
    ///
    /// Returns the trailing events (flushed text and one `ToolCall` per completed
    /// call, in first-seen order) together with the aggregate.
    ///
    /// # Errors
    ///
    /// [`Error::Aggregator`] if called more than once.
    pub fn finish(&mut self) -> Result<(Vec<StreamEvent>, AggregateResult)> {
        if matches!(
            self.state,
            AggregatorState::Finalizing | AggregatorState::Done
        ) {
            return Err(Error::aggregator("response has already been finalized"));
        }
        self.state = AggregatorState::Finalizing;

        let mut events = Vec::new();
        for segment in self.splitter.finish() {
            self.route(segment, &mut events);
        }
        if self.splitter.is_inside() {
            log::warn!("Response ended inside an unterminated reasoning block; keeping the tail as reasoning");
        }

        let tool_calls: Vec<ToolCall> = std::mem::take(&mut self.tool_calls)
            .into_iter()
            .map(|partial| {
                let id = partial
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", partial.index));
                let call = ToolCall::from_raw(id, partial.name.unwrap_or_default(), &partial.arguments);
                if let Err(e) = call.arguments() {
                    log::warn!("{}", e);
                }
                call
            })
            .collect();
        events.extend(tool_calls.iter().cloned().map(StreamEvent::ToolCall));
        self.slots.clear();
        self.ids.clear();

        let result = AggregateResult {
            reasoning: std::mem::take(&mut self.reasoning),
            answer: std::mem::take(&mut self.answer),
            tool_calls,
            finish_reason: self.finish_reason.take(),
        };
        log::debug!(
            "Aggregated response: {} answer bytes, {} reasoning bytes, {} tool calls",
            result.answer.len(),
            result.reasoning.len(),
            result.tool_calls.len()
        );

        self.state = AggregatorState::Done;
        Ok((events, result))
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            AggregatorState::Idle | AggregatorState::Streaming => Ok(()),
            AggregatorState::Finalizing | AggregatorState::Done => Err(Error::aggregator(
                "fragment delivered after the response was finalized",
            )),
        }
    }

    fn route(&mut self, segment: Segment, events: &mut Vec<StreamEvent>) {
        match segment {
            Segment::Answer(text) if !text.is_empty() => {
                self.answer.push_str(&text);
                events.push(StreamEvent::Answer(text));
            }
            Segment::Reasoning(text) if !text.is_empty() => {
                self.reasoning.push_str(&text);
                if !self.hide_thinking {
                    events.push(StreamEvent::Reasoning(text));
                }
            }
            _ => {}
        }
    }

    fn merge_tool_call(&mut self, fragment: &ToolCallFragment) {
        let position = *self.slots.entry(fragment.index).or_insert_with(|| {
            self.tool_calls.push(PartialToolCall {
                index: fragment.index,
                id: None,
                name: None,
                arguments: String::new(),
            });
            self.tool_calls.len() - 1
        });
        let entry = &mut self.tool_calls[position];

        // id and name usually arrive once, but late arrivals are merged
        if let Some(id) = fragment.id.as_ref().filter(|id| !id.is_empty()) {
            entry.id = Some(id.clone());
        }
        if let Some(name) = fragment.name.as_ref().filter(|name| !name.is_empty()) {
            entry.name = Some(name.clone());
        }
        entry.arguments.push_str(&fragment.arguments);
    }

    /// Work out which call a wire delta belongs to.
    ///
    /// `index` wins. Without it, a known `id` maps to its call and a new `id` gets
    /// the next free index. A delta with neither continues the latest call.
    fn resolve_index(&mut self, index: Option<u32>, id: Option<&str>) -> Result<u32> {
        let id = id.filter(|id| !id.is_empty());
        match (index, id) {
            (Some(index), Some(id)) => {
                self.ids.insert(id.to_string(), index);
                Ok(index)
            }
            (Some(index), None) => Ok(index),
            (None, Some(id)) => {
                if let Some(index) = self.ids.get(id) {
                    return Ok(*index);
                }
                let next = match self.tool_calls.iter().map(|call| call.index).max() {
                    Some(last) => last
                        .checked_add(1)
                        .ok_or_else(|| Error::stream("tool call index out of range"))?,
                    None => 0,
                };
                self.ids.insert(id.to_string(), next);
                Ok(next)
            }
            (None, None) => self
                .tool_calls
                .last()
                .map(|call| call.index)
                .ok_or_else(|| Error::stream("tool call delta carries neither an index nor an id")),
        }
    }
}

/// Run a complete fragment sequence through a fresh aggregator without surfacing
/// intermediate events.
pub fn aggregate_batch(
    fragments: impl IntoIterator<Item = Fragment>,
    options: AggregatorOptions,
) -> Result<AggregateResult> {
    let mut aggregator = DeltaAggregator::new(options);
    for fragment in fragments {
        aggregator.push(fragment)?;
    }
    let (_, result) = aggregator.finish()?;
    Ok(result)
}

/// Aggregate a non-streaming response.
///
/// # Errors
///
/// [`Error::Stream`] when the response holds no choices.
pub fn aggregate_response(
    response: OpenAIResponse,
    options: AggregatorOptions,
) -> Result<AggregateResult> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::stream("response contained no choices"))?;
    let message = choice.message;

    let mut fragments = Vec::new();
    if let Some(reasoning) = pick_reasoning(&message.reasoning_content, &message.reasoning) {
        fragments.push(Fragment::Reasoning(reasoning.to_string()));
    }
    if let Some(content) = message.content {
        fragments.push(Fragment::Content(content));
    }
    for (index, call) in message.tool_calls.unwrap_or_default().into_iter().enumerate() {
        fragments.push(Fragment::ToolCall(ToolCallFragment {
            index: index as u32,
            id: Some(call.id).filter(|id| !id.is_empty()),
            name: Some(call.function.name),
            arguments: call.function.arguments,
        }));
    }

    let mut result = aggregate_batch(fragments, options)?;
    result.finish_reason = choice.finish_reason;
    Ok(result)
}
