//! Tool Loop Example
//!
//! Gives a local model calculator tools and lets the client run them
//! automatically until the model produces a text answer.
//!
//! ```text
//! LLM_WRAPPER_MODEL=qwen3-8b cargo run --example tool_loop
//! ```

use futures::StreamExt;
use llm_wrapper::{Error, Llm, LlmOptions, Message, StreamEvent, tool};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let add = tool("add", "Add two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        });

    let multiply = tool("multiply", "Multiply two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a * b}))
        });

    let divide = tool("divide", "Divide two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(Error::tool("Cannot divide by zero"));
            }
            Ok(json!({"result": a / b}))
        });

    let options = LlmOptions::builder()
        .system_prompt(
            "You are a calculator assistant. Use the provided tools for every \
             arithmetic step and explain the result.",
        )
        .tools(vec![add, multiply, divide])
        .hide_thinking(true)
        .max_tool_rounds(6)
        .temperature(0.1)
        .build()?;
    let llm = Llm::new(options)?;

    println!("{}", "=".repeat(70));
    println!("BLOCKING");
    println!("{}", "=".repeat(70));

    let mut conversation = vec![Message::user("What's 7 times 8, then add 5?")];
    match llm.response(&mut conversation).await {
        Ok(result) => {
            println!("Assistant: {}", result.answer);
            println!("({} messages in conversation)", conversation.len());
        }
        Err(Error::RecursionLimit { rounds, conversation }) => {
            println!(
                "Gave up after {} tool rounds ({} messages)",
                rounds,
                conversation.len()
            );
        }
        Err(e) => return Err(e.into()),
    }

    println!();
    println!("{}", "=".repeat(70));
    println!("STREAMING");
    println!("{}", "=".repeat(70));

    let mut stream = llm
        .response_stream(vec![Message::user("Divide 144 by 12, then by 0.")])
        .await?;
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Answer(text) => print!("{}", text),
            StreamEvent::ToolCall(call) => {
                println!("\n🔧 {}({})", call.name, call.raw_arguments());
            }
            StreamEvent::ToolResult { name, result, .. } => {
                println!("   {} -> {}", name, result);
            }
            StreamEvent::Done => {
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
