//! Streaming with Reasoning Example
//!
//! Streams a response from a local reasoning model and prints the model's
//! thinking separately from its answer.
//!
//! Run against LM Studio (or any OpenAI-compatible server):
//!
//! ```text
//! LLM_WRAPPER_MODEL=qwen3-8b RUST_LOG=llm_wrapper=debug cargo run --example stream_reasoning
//! ```

use anyhow::Context;
use futures::StreamExt;
use llm_wrapper::{Llm, LlmOptions, Message, StreamEvent, get_base_url};
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let hide_thinking = std::env::args().any(|arg| arg == "--hide-thinking");

    let options = LlmOptions::builder()
        .system_prompt("You are a concise assistant. Think before you answer.")
        .base_url(get_base_url(None, Some("http://localhost:1234/v1")))
        .hide_thinking(hide_thinking)
        .emit_final(true)
        .temperature(0.6)
        .build()
        .context("set LLM_WRAPPER_MODEL to the model you want to use")?;

    let llm = Llm::new(options)?;
    let prompt = "A bat and a ball cost $1.10 in total. The bat costs $1.00 more than the ball. How much does the ball cost?";

    println!("{}", "=".repeat(70));
    println!("User: {}", prompt);
    println!("{}", "=".repeat(70));

    let mut stream = llm.response_stream(vec![Message::user(prompt)]).await?;
    let mut in_reasoning = false;
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Reasoning(text) => {
                if !in_reasoning {
                    println!("\n[thinking]");
                    in_reasoning = true;
                }
                print!("\x1b[2m{}\x1b[0m", text);
            }
            StreamEvent::Answer(text) => {
                if in_reasoning {
                    println!("\n\n[answer]");
                    in_reasoning = false;
                }
                print!("{}", text);
            }
            StreamEvent::Final(result) => {
                println!("\n{}", "-".repeat(70));
                println!(
                    "reasoning: {} chars, answer: {} chars, finish_reason: {:?}",
                    result.reasoning.len(),
                    result.answer.len(),
                    result.finish_reason
                );
            }
            StreamEvent::Done => break,
            _ => {}
        }
        stdout.flush()?;
    }

    Ok(())
}
