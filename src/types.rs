//! Core types for llm-wrapper

use crate::config::{self, Provider};
use crate::reasoning::ReasoningMarkers;
use crate::tools::{Tool, ToolRegistry, ToolSpec};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Options for configuring an [`Llm`](crate::Llm)
#[derive(Clone)]
pub struct LlmOptions {
    /// System prompt prepended to every request (empty means none)
    pub system_prompt: String,

    /// Model name (e.g., "qwen2.5-7b-instruct")
    pub model: String,

    /// OpenAI-compatible endpoint URL, including the `/v1` suffix
    pub base_url: String,

    /// API key (most local servers accept any value)
    pub api_key: String,

    /// Encode local images (`ImagePath`, `ImageBytes`) as base64 data URLs
    pub vllm_mode: bool,

    /// Unload every other loaded model (LM Studio) before inference
    pub unload_other_models: bool,

    /// Keep reasoning out of streamed events; it is still collected in the result
    pub hide_thinking: bool,

    /// Emit a `Final` event carrying the aggregate right before `Done`
    pub emit_final: bool,

    /// Marker pair delimiting inline reasoning in content deltas
    pub reasoning_markers: ReasoningMarkers,

    /// Maximum tokens to generate (None uses provider default)
    pub max_tokens: Option<u32>,

    /// Sampling temperature (None uses provider default)
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Structured-output descriptor forwarded as `response_format`
    pub response_format: Option<Value>,

    /// Tools offered to the model, with callables for auto-execution
    pub tools: ToolRegistry,

    /// Execute registered callables automatically and re-submit
    pub auto_execute_tools: bool,

    /// Maximum tool-resolution rounds per request
    pub max_tool_rounds: u32,

    /// Maximum failed tool invocations tolerated per request
    pub max_tool_errors: u32,
}

impl std::fmt::Debug for LlmOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmOptions")
            .field("system_prompt", &self.system_prompt)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("vllm_mode", &self.vllm_mode)
            .field("unload_other_models", &self.unload_other_models)
            .field("hide_thinking", &self.hide_thinking)
            .field("emit_final", &self.emit_final)
            .field("reasoning_markers", &self.reasoning_markers)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("response_format", &self.response_format)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("auto_execute_tools", &self.auto_execute_tools)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("max_tool_errors", &self.max_tool_errors)
            .finish()
    }
}

impl LlmOptions {
    /// Create a new builder for LlmOptions
    pub fn builder() -> LlmOptionsBuilder {
        LlmOptionsBuilder::default()
    }
}

/// Builder for LlmOptions
#[derive(Default)]
pub struct LlmOptionsBuilder {
    system_prompt: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    provider: Option<Provider>,
    api_key: Option<String>,
    vllm_mode: Option<bool>,
    unload_other_models: Option<bool>,
    hide_thinking: Option<bool>,
    emit_final: Option<bool>,
    reasoning_markers: Option<ReasoningMarkers>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Option<u64>,
    response_format: Option<Value>,
    tools: Vec<Tool>,
    tool_specs: Vec<ToolSpec>,
    auto_execute_tools: Option<bool>,
    max_tool_rounds: Option<u32>,
    max_tool_errors: Option<u32>,
}

impl std::fmt::Debug for LlmOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmOptionsBuilder")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("provider", &self.provider)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("tool_specs", &format!("{} specs", self.tool_specs.len()))
            .finish()
    }
}

impl LlmOptionsBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Target a known server: its default URL (unless `base_url` is set or the
    /// environment overrides it) and its image handling (unless `vllm_mode` is set)
    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn vllm_mode(mut self, enabled: bool) -> Self {
        self.vllm_mode = Some(enabled);
        self
    }

    pub fn unload_other_models(mut self, enabled: bool) -> Self {
        self.unload_other_models = Some(enabled);
        self
    }

    pub fn hide_thinking(mut self, hide: bool) -> Self {
        self.hide_thinking = Some(hide);
        self
    }

    pub fn emit_final(mut self, emit: bool) -> Self {
        self.emit_final = Some(emit);
        self
    }

    pub fn reasoning_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.reasoning_markers = Some(ReasoningMarkers::new(open, close));
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Forward a raw `response_format` object
    pub fn response_format(mut self, format: Value) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Request output conforming to a JSON schema
    pub fn json_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.response_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": name.into(),
                "schema": schema,
                "strict": true
            }
        }));
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Offer a tool to the model without a callable behind it
    pub fn tool_spec(mut self, spec: ToolSpec) -> Self {
        self.tool_specs.push(spec);
        self
    }

    pub fn auto_execute_tools(mut self, auto: bool) -> Self {
        self.auto_execute_tools = Some(auto);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    pub fn max_tool_errors(mut self, errors: u32) -> Self {
        self.max_tool_errors = Some(errors);
        self
    }

    pub fn build(self) -> Result<LlmOptions> {
        let model = self
            .model
            .or_else(|| config::get_model(None, true))
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::config("model is required"))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config::get_base_url(self.provider, None));
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(Error::config(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    temp
                )));
            }
        }

        let max_tool_rounds = self.max_tool_rounds.unwrap_or(5);
        if max_tool_rounds == 0 {
            return Err(Error::config("max_tool_rounds must be at least 1"));
        }

        let reasoning_markers = self.reasoning_markers.unwrap_or_default();
        reasoning_markers.validate()?;

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register_tool(tool)?;
        }
        for spec in self.tool_specs {
            tools.register_spec(spec)?;
        }

        Ok(LlmOptions {
            system_prompt: self.system_prompt.unwrap_or_default(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.unwrap_or_else(config::get_api_key),
            vllm_mode: self
                .vllm_mode
                .unwrap_or_else(|| self.provider.is_some_and(|p| p.needs_inline_images())),
            unload_other_models: self.unload_other_models.unwrap_or(false),
            hide_thinking: self.hide_thinking.unwrap_or(false),
            emit_final: self.emit_final.unwrap_or(false),
            reasoning_markers,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout.unwrap_or(120),
            response_format: self.response_format,
            tools,
            auto_execute_tools: self.auto_execute_tools.unwrap_or(true),
            max_tool_rounds,
            max_tool_errors: self.max_tool_errors.unwrap_or(3),
        })
    }
}

/// Message role in the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Content block types that can appear in messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    ImagePath(ImagePathBlock),
    ImageUrl(ImageUrlBlock),
    ImageBytes(ImageBytesBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock::new(text))
    }

    pub fn image_path(path: impl Into<PathBuf>) -> Self {
        ContentBlock::ImagePath(ImagePathBlock { path: path.into() })
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentBlock::ImageUrl(ImageUrlBlock { url: url.into() })
    }

    pub fn image_bytes(data: Vec<u8>, mime_type: Option<String>) -> Self {
        ContentBlock::ImageBytes(ImageBytesBlock { data, mime_type })
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            ContentBlock::ImagePath(_) | ContentBlock::ImageUrl(_) | ContentBlock::ImageBytes(_)
        )
    }
}

/// Text content block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Image stored on the local filesystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagePathBlock {
    pub path: PathBuf,
}

/// Image the backend fetches by URL (remote or already a data URL)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrlBlock {
    pub url: String,
}

/// Encoded image held in memory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageBytesBlock {
    pub data: Vec<u8>,
    /// Explicit MIME type; sniffed from the bytes when absent
    pub mime_type: Option<String>,
}

/// Tool call requested by the assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    /// Arguments as the JSON string sent on the wire
    pub arguments: String,
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build the block echoed back to the server for a completed call.
    /// Invalid arguments are echoed verbatim.
    pub fn from_call(call: &ToolCall) -> Self {
        Self::new(&call.id, &call.name, call.raw_arguments())
    }
}

/// Output of one tool call, fed back to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultBlock {
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResultBlock {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a user message with custom content blocks
    pub fn user_with_blocks(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Text followed by a local image
    pub fn user_with_image_path(text: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::user_with_blocks(vec![
            ContentBlock::text(text),
            ContentBlock::image_path(path.as_ref()),
        ])
    }

    /// Text followed by a remote image
    pub fn user_with_image_url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self::user_with_blocks(vec![ContentBlock::text(text), ContentBlock::image_url(url)])
    }

    /// Tool-role message carrying the result of one call
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Tool,
            vec![ContentBlock::ToolResult(ToolResultBlock::new(
                tool_call_id,
                content,
            ))],
        )
    }

    /// Assistant turn recording an aggregate: its answer text, then its tool calls
    pub fn assistant_turn(result: &AggregateResult) -> Self {
        let mut content = Vec::with_capacity(result.tool_calls.len() + 1);
        if !result.answer.is_empty() {
            content.push(ContentBlock::text(&result.answer));
        }
        content.extend(
            result
                .tool_calls
                .iter()
                .map(|call| ContentBlock::ToolUse(ToolUseBlock::from_call(call))),
        );
        Self::new(MessageRole::Assistant, content)
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One incremental piece of a tool call, keyed by its position in the turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

impl ToolCallFragment {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.id.as_deref().is_none_or(str::is_empty)
            && self.name.as_deref().is_none_or(str::is_empty)
            && self.arguments.is_empty()
    }
}

/// Parsed arguments of a completed tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolArguments {
    Parsed { value: Value },
    Invalid { raw: String, error: String },
}

/// A tool call reassembled from its fragments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Build a call from a raw argument string; empty arguments mean `{}`
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw: &str) -> Self {
        let arguments = if raw.trim().is_empty() {
            ToolArguments::Parsed {
                value: serde_json::json!({}),
            }
        } else {
            match serde_json::from_str(raw) {
                Ok(value) => ToolArguments::Parsed { value },
                Err(e) => ToolArguments::Invalid {
                    raw: raw.to_string(),
                    error: e.to_string(),
                },
            }
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// The parsed arguments, or a schema error naming this tool
    pub fn arguments(&self) -> Result<&Value> {
        match &self.arguments {
            ToolArguments::Parsed { value } => Ok(value),
            ToolArguments::Invalid { error, .. } => Err(Error::schema(&self.name, error)),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.arguments, ToolArguments::Parsed { .. })
    }

    /// Arguments as a JSON string, verbatim when they failed to parse
    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            ToolArguments::Parsed { value } => value.to_string(),
            ToolArguments::Invalid { raw, .. } => raw.clone(),
        }
    }
}

/// The fully reassembled result of one exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateResult {
    pub reasoning: String,
    pub answer: String,
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl AggregateResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Deserialize a structured-output answer
    pub fn parse_answer<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(self.answer.trim())?)
    }
}

/// Typed events produced while a response streams
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamEvent {
    Reasoning(String),
    Answer(String),
    ToolCallDelta(ToolCallFragment),
    ToolCall(ToolCall),
    ToolResult {
        call_id: String,
        name: String,
        result: String,
    },
    /// The full conversation after the request, including tool turns; sent right
    /// before `Final` when `emit_final` is on
    Conversation(Vec<Message>),
    Final(AggregateResult),
    Done,
}

/// OpenAI API message format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAIMessage {
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(OpenAIContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Message content: plain text or an ordered list of parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

/// One part of a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

impl OpenAIContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        OpenAIContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        OpenAIContentPart::ImageUrl {
            image_url: OpenAIImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAIImageUrl {
    pub url: String,
}

/// OpenAI tool call format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAIToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: OpenAIFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// OpenAI function format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAIFunction {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// OpenAI API request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

/// OpenAI API non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<OpenAIResponseChoice>,
}

/// OpenAI choice in a non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponseChoice {
    #[serde(default)]
    pub index: u32,
    pub message: OpenAIResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

/// OpenAI API streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAIChoice>,
}

/// OpenAI choice in streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: OpenAIDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI delta in streaming response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

/// OpenAI tool call delta
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAIFunctionDelta>,
}

/// OpenAI function delta
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Servers disagree on the reasoning field name; take whichever is populated.
pub(crate) fn pick_reasoning<'a>(
    reasoning_content: &'a Option<String>,
    reasoning: &'a Option<String>,
) -> Option<&'a str> {
    reasoning_content
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| reasoning.as_deref().filter(|s| !s.is_empty()))
}
