//! Tool execution loop tests
//!
//! A scripted transport stands in for the server so that each round of the loop
//! can be inspected: what was executed, what was fed back, and when it stops.

use async_trait::async_trait;
use futures::StreamExt;
use llm_wrapper::{
    ChunkStream, ContentBlock, Error, Llm, LlmOptions, Message, MessageRole, OpenAIChunk,
    OpenAIContent, OpenAIRequest, OpenAIResponse, Result, StreamEvent, Transport, tool,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ScriptedServer {
    replies: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<OpenAIRequest>>,
}

impl ScriptedServer {
    fn new(replies: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next_reply(&self, request: &OpenAIRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::other("server ran out of replies"))
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn complete(&self, request: &OpenAIRequest) -> Result<OpenAIResponse> {
        let message = self.next_reply(request)?;
        Ok(serde_json::from_value(json!({"choices": [{"message": message}]}))?)
    }

    /// Streams the same reply one field per chunk
    async fn stream(&self, request: &OpenAIRequest) -> Result<ChunkStream> {
        let message = self.next_reply(request)?;
        let mut chunks = Vec::new();
        if let Some(text) = message["content"].as_str() {
            for piece in text.split_inclusive(' ') {
                chunks.push(json!({"choices": [{"delta": {"content": piece}}]}));
            }
        }
        if let Some(calls) = message["tool_calls"].as_array() {
            for (index, call) in calls.iter().enumerate() {
                let arguments = call["function"]["arguments"].as_str().unwrap_or("");
                let (head, tail) = arguments.split_at(arguments.len() / 2);
                chunks.push(json!({"choices": [{"delta": {"tool_calls": [{
                    "index": index, "id": call["id"], "function": {"name": call["function"]["name"], "arguments": head}
                }]}}]}));
                chunks.push(json!({"choices": [{"delta": {"tool_calls": [{
                    "index": index, "function": {"arguments": tail}
                }]}}]}));
            }
        }
        let parsed: Vec<Result<OpenAIChunk>> = chunks
            .into_iter()
            .map(|c| serde_json::from_value(c).map_err(Error::from))
            .collect();
        Ok(Box::pin(futures::stream::iter(parsed)))
    }
}

fn say(text: &str) -> Value {
    json!({"role": "assistant", "content": text})
}

fn call(id: &str, name: &str, arguments: &str) -> Value {
    json!({"role": "assistant", "content": null, "tool_calls": [
        {"id": id, "type": "function", "function": {"name": name, "arguments": arguments}}
    ]})
}

fn calculator_options() -> llm_wrapper::LlmOptionsBuilder {
    let add = tool("add", "Add two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        });
    let fail = tool("flaky", "Always fails")
        .build(|_| async { Err(Error::tool("backend unavailable")) });

    LlmOptions::builder()
        .model("qwen3-8b")
        .base_url("http://localhost:1234/v1")
        .tool(add)
        .tool(fail)
}

fn tool_messages(request: &OpenAIRequest) -> Vec<(String, String)> {
    request
        .messages
        .iter()
        .filter(|m| m.role == "tool")
        .map(|m| {
            let content = match &m.content {
                Some(OpenAIContent::Text(text)) => text.clone(),
                other => panic!("tool message content should be text, got {:?}", other),
            };
            (m.tool_call_id.clone().unwrap_or_default(), content)
        })
        .collect()
}

#[tokio::test]
async fn test_sequential_rounds_reach_text_answer() {
    let server = ScriptedServer::new(vec![
        call("c1", "add", r#"{"a":5,"b":3}"#),
        call("c2", "add", r#"{"a":8,"b":8}"#),
        say("5 + 3 = 8, doubled is 16."),
    ]);
    let llm = Llm::with_transport(calculator_options().build().unwrap(), server.clone());

    let mut conversation = vec![Message::user("Add 5 and 3, then double it")];
    let result = llm.response(&mut conversation).await.unwrap();

    assert_eq!(result.answer, "5 + 3 = 8, doubled is 16.");
    assert_eq!(server.request_count(), 3);

    let roles: Vec<MessageRole> = conversation.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );

    let last_request = server.requests.lock().unwrap()[2].clone();
    assert_eq!(
        tool_messages(&last_request),
        vec![
            ("c1".to_string(), r#"{"result":8.0}"#.to_string()),
            ("c2".to_string(), r#"{"result":16.0}"#.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let server = ScriptedServer::new(vec![
        call("c1", "teleport", r#"{"to":"Mars"}"#),
        say("I cannot teleport."),
    ]);
    let llm = Llm::with_transport(calculator_options().build().unwrap(), server.clone());

    let mut conversation = vec![Message::user("Take me to Mars")];
    let result = llm.response(&mut conversation).await.unwrap();

    assert_eq!(result.answer, "I cannot teleport.");
    let second = server.requests.lock().unwrap()[1].clone();
    assert_eq!(
        tool_messages(&second),
        vec![("c1".to_string(), "error: unknown tool 'teleport'".to_string())]
    );
}

#[tokio::test]
async fn test_invalid_arguments_are_reported_not_executed() {
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();
    let counted = tool("counted", "Counts calls").build(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!("ok"))
        }
    });
    let server = ScriptedServer::new(vec![call("c1", "counted", r#"{"x":"#), say("sorry")]);
    let llm = Llm::with_transport(
        LlmOptions::builder()
            .model("m")
            .base_url("http://localhost:1234/v1")
            .tool(counted)
            .build()
            .unwrap(),
        server.clone(),
    );

    let mut conversation = vec![Message::user("count")];
    llm.response(&mut conversation).await.unwrap();

    assert_eq!(executed.load(Ordering::SeqCst), 0);
    let second = server.requests.lock().unwrap()[1].clone();
    let (_, content) = &tool_messages(&second)[0];
    assert!(
        content.starts_with("error: invalid arguments for tool 'counted': "),
        "got {:?}",
        content
    );
    // the malformed arguments are echoed back verbatim
    let assistant = &second.messages[1];
    assert_eq!(
        assistant.tool_calls.as_ref().unwrap()[0].function.arguments,
        r#"{"x":"#
    );
}

#[tokio::test]
async fn test_handler_error_is_fed_back() {
    let server = ScriptedServer::new(vec![call("c1", "flaky", "{}"), say("It failed.")]);
    let llm = Llm::with_transport(calculator_options().build().unwrap(), server.clone());

    let mut conversation = vec![Message::user("try it")];
    let result = llm.response(&mut conversation).await.unwrap();

    assert_eq!(result.answer, "It failed.");
    match &conversation[2].content[0] {
        ContentBlock::ToolResult(block) => {
            assert_eq!(block.tool_call_id, "c1");
            assert_eq!(block.content, "error: Tool execution error: backend unavailable");
        }
        other => panic!("Expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_round_limit_returns_partial_conversation() {
    let server = ScriptedServer::new(vec![
        call("c1", "add", r#"{"a":1,"b":1}"#),
        call("c2", "add", r#"{"a":2,"b":2}"#),
        call("c3", "add", r#"{"a":3,"b":3}"#),
    ]);
    let llm = Llm::with_transport(
        calculator_options().max_tool_rounds(2).build().unwrap(),
        server.clone(),
    );

    let mut conversation = vec![Message::user("keep adding")];
    match llm.response(&mut conversation).await {
        Err(Error::RecursionLimit {
            rounds,
            conversation: partial,
        }) => {
            assert_eq!(rounds, 2);
            // user + 2 × (assistant, tool) + the final assistant request
            assert_eq!(partial.len(), 6);
            assert_eq!(partial.last().unwrap().role, MessageRole::Assistant);
        }
        other => panic!("Expected RecursionLimit, got {:?}", other),
    }
    assert_eq!(server.request_count(), 3);
}

#[tokio::test]
async fn test_error_limit_stops_the_loop() {
    let server = ScriptedServer::new(vec![
        call("c1", "flaky", "{}"),
        call("c2", "flaky", "{}"),
        say("unreachable"),
    ]);
    let llm = Llm::with_transport(
        calculator_options().max_tool_errors(1).build().unwrap(),
        server.clone(),
    );

    let mut conversation = vec![Message::user("try twice")];
    let result = llm.response(&mut conversation).await;
    assert!(matches!(result, Err(Error::Tool(_))), "got {:?}", result);
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn test_auto_execution_disabled_returns_calls() {
    let server = ScriptedServer::new(vec![call("c1", "add", r#"{"a":1,"b":2}"#)]);
    let llm = Llm::with_transport(
        calculator_options().auto_execute_tools(false).build().unwrap(),
        server.clone(),
    );

    let mut conversation = vec![Message::user("1+2")];
    let result = llm.response(&mut conversation).await.unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "add");
    assert_eq!(server.request_count(), 1);
    // the caller can answer the call and continue
    assert_eq!(conversation.len(), 2);
    conversation.push(Message::tool_result("c1", "3"));
}

#[tokio::test]
async fn test_handlerless_tools_are_left_to_the_caller() {
    let server = ScriptedServer::new(vec![call("c1", "lookup", r#"{"q":"rust"}"#)]);
    let llm = Llm::with_transport(
        LlmOptions::builder()
            .model("m")
            .base_url("http://localhost:1234/v1")
            .tool_spec(tool("lookup", "Search the docs").param("q", "string").spec())
            .build()
            .unwrap(),
        server.clone(),
    );

    let mut conversation = vec![Message::user("find rust")];
    let result = llm.response(&mut conversation).await.unwrap();
    assert_eq!(result.tool_calls[0].arguments().unwrap(), &json!({"q": "rust"}));

    let request = server.requests.lock().unwrap()[0].clone();
    assert_eq!(request.tools.unwrap()[0]["function"]["name"], "lookup");
}

#[tokio::test]
async fn test_streaming_loop_emits_tool_results() {
    let server = ScriptedServer::new(vec![
        call("c1", "add", r#"{"a":20,"b":22}"#),
        say("The answer is 42"),
    ]);
    let llm = Llm::with_transport(
        calculator_options().emit_final(true).build().unwrap(),
        server.clone(),
    );

    let events: Vec<StreamEvent> = llm
        .response_stream(vec![Message::user("20 + 22")])
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            StreamEvent::Reasoning(_) => "reasoning",
            StreamEvent::Answer(_) => "answer",
            StreamEvent::ToolCallDelta(_) => "delta",
            StreamEvent::ToolCall(_) => "call",
            StreamEvent::ToolResult { .. } => "result",
            StreamEvent::Conversation(_) => "conversation",
            StreamEvent::Final(_) => "final",
            StreamEvent::Done => "done",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "delta", "delta", "call", "result", "answer", "answer", "answer", "answer",
            "conversation", "final", "done",
        ]
    );

    match &events[3] {
        StreamEvent::ToolResult { call_id, name, result } => {
            assert_eq!(call_id, "c1");
            assert_eq!(name, "add");
            assert_eq!(result, r#"{"result":42.0}"#);
        }
        other => panic!("Expected tool result, got {:?}", other),
    }
    // the finished conversation can be continued by the caller
    match &events[8] {
        StreamEvent::Conversation(conversation) => {
            let roles: Vec<MessageRole> = conversation.iter().map(|m| m.role).collect();
            assert_eq!(
                roles,
                vec![
                    MessageRole::User,
                    MessageRole::Assistant,
                    MessageRole::Tool,
                    MessageRole::Assistant,
                ]
            );
            assert_eq!(conversation[3].text(), "The answer is 42");
        }
        other => panic!("Expected conversation, got {:?}", other),
    }
    match &events[9] {
        StreamEvent::Final(result) => assert_eq!(result.answer, "The answer is 42"),
        other => panic!("Expected final, got {:?}", other),
    }
}
