//! Conversion of conversation messages to the OpenAI wire format.
//!
//! Each [`Message`] becomes one or more [`OpenAIMessage`]s:
//!
//! ```text
//! ToolResult blocks  → one role:"tool" message per block, with tool_call_id
//! ToolUse blocks     → role:"assistant" with tool_calls (content "" when no text)
//! image blocks       → content-part array, order preserved (user messages only)
//! text only          → text blocks joined with "\n"
//! ```
//!
//! Local images ([`ImagePath`](crate::ContentBlock::ImagePath) and
//! [`ImageBytes`](crate::ContentBlock::ImageBytes)) are only sent in local-image
//! mode (`vllm_mode`), where they are inlined as base64 data URLs.

use crate::types::{
    ContentBlock, ImageBytesBlock, Message, MessageRole, OpenAIContent, OpenAIContentPart,
    OpenAIFunction, OpenAIMessage, OpenAIToolCall,
};
use crate::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::path::Path;

/// Build the `messages` array for one request.
///
/// A non-empty `system_prompt` is prepended as a system message.
///
/// # Errors
///
/// - [`Error::InvalidInput`] for an image outside a user message or next to tool
///   blocks, a local image while `vllm_mode` is off, or a tool message without a
///   tool result block
/// - [`Error::Image`] when a local image file cannot be read
pub fn to_openai_messages(
    system_prompt: &str,
    messages: &[Message],
    vllm_mode: bool,
) -> Result<Vec<OpenAIMessage>> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        out.push(OpenAIMessage::text("system", system_prompt));
    }
    for message in messages {
        convert_message(message, vllm_mode, &mut out)?;
    }
    Ok(out)
}

fn convert_message(msg: &Message, vllm_mode: bool, out: &mut Vec<OpenAIMessage>) -> Result<()> {
    let mut text_blocks = Vec::new();
    let mut tool_use_blocks = Vec::new();
    let mut tool_result_blocks = Vec::new();
    let mut has_images = false;

    for block in &msg.content {
        match block {
            ContentBlock::Text(text) => text_blocks.push(text.text.as_str()),
            ContentBlock::ToolUse(tool_use) => tool_use_blocks.push(tool_use),
            ContentBlock::ToolResult(tool_result) => tool_result_blocks.push(tool_result),
            ContentBlock::ImagePath(_) | ContentBlock::ImageUrl(_) | ContentBlock::ImageBytes(_) => {
                has_images = true
            }
        }
    }

    if has_images && msg.role != MessageRole::User {
        return Err(Error::invalid_input(format!(
            "images are only supported in user messages, found one in a {} message",
            msg.role.as_str()
        )));
    }
    if has_images && !(tool_result_blocks.is_empty() && tool_use_blocks.is_empty()) {
        return Err(Error::invalid_input(
            "images cannot share a message with tool calls or tool results",
        ));
    }

    if !tool_result_blocks.is_empty() {
        for tool_result in tool_result_blocks {
            out.push(OpenAIMessage {
                role: MessageRole::Tool.as_str().to_string(),
                content: Some(OpenAIContent::Text(tool_result.content.clone())),
                tool_calls: None,
                tool_call_id: Some(tool_result.tool_call_id.clone()),
            });
        }
    } else if !tool_use_blocks.is_empty() {
        let tool_calls = tool_use_blocks
            .iter()
            .map(|tool_use| OpenAIToolCall {
                id: tool_use.id.clone(),
                call_type: "function".to_string(),
                function: OpenAIFunction {
                    name: tool_use.name.clone(),
                    arguments: tool_use.arguments.clone(),
                },
            })
            .collect();

        // content is required alongside tool_calls, even when empty
        out.push(OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: Some(OpenAIContent::Text(text_blocks.join("\n"))),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        });
    } else if msg.role == MessageRole::Tool {
        return Err(Error::invalid_input(
            "tool messages need a tool_call_id; build them with Message::tool_result",
        ));
    } else if has_images {
        let mut parts = Vec::with_capacity(msg.content.len());
        for block in &msg.content {
            match block {
                ContentBlock::Text(text) => parts.push(OpenAIContentPart::text(&text.text)),
                ContentBlock::ImageUrl(image) => {
                    parts.push(OpenAIContentPart::image_url(&image.url))
                }
                ContentBlock::ImagePath(image) => {
                    require_local_images(vllm_mode)?;
                    parts.push(OpenAIContentPart::image_url(encode_image_file(&image.path)?));
                }
                ContentBlock::ImageBytes(image) => {
                    require_local_images(vllm_mode)?;
                    parts.push(OpenAIContentPart::image_url(encode_image_block(image)));
                }
                ContentBlock::ToolUse(_) | ContentBlock::ToolResult(_) => {}
            }
        }
        log::debug!("Serialized user message with {} content parts", parts.len());

        out.push(OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: Some(OpenAIContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
        });
    } else {
        out.push(OpenAIMessage::text(msg.role.as_str(), text_blocks.join("\n")));
    }

    Ok(())
}

fn require_local_images(vllm_mode: bool) -> Result<()> {
    if vllm_mode {
        Ok(())
    } else {
        Err(Error::invalid_input(
            "local images require vllm_mode; pass an image URL or enable vllm_mode",
        ))
    }
}

/// Read an image file and encode it as a `data:` URL.
///
/// The MIME type comes from the file extension, then from the file's magic bytes,
/// then defaults to `image/png`.
pub fn encode_image_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let mime = mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| sniff_image_mime(&data).to_string());
    Ok(data_url(&mime, &data))
}

/// Encode in-memory image bytes as a `data:` URL; an explicit MIME type wins
pub fn encode_image_bytes(data: &[u8], mime_type: Option<&str>) -> String {
    let mime = mime_type
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| sniff_image_mime(data));
    data_url(mime, data)
}

fn encode_image_block(image: &ImageBytesBlock) -> String {
    encode_image_bytes(&image.data, image.mime_type.as_deref())
}

fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(data))
}

fn sniff_image_mime(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateResult, ToolCall};

    #[test]
    fn test_system_prompt_prepended() {
        let messages = to_openai_messages("be brief", &[Message::user("hi")], false).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], OpenAIMessage::text("system", "be brief"));
        assert_eq!(messages[1], OpenAIMessage::text("user", "hi"));

        let messages = to_openai_messages("", &[Message::user("hi")], false).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_text_blocks_joined() {
        let msg = Message::user_with_blocks(vec![
            ContentBlock::text("line one"),
            ContentBlock::text("line two"),
        ]);
        let messages = to_openai_messages("", &[msg], false).unwrap();
        assert_eq!(
            messages[0].content,
            Some(OpenAIContent::Text("line one\nline two".to_string()))
        );
    }

    #[test]
    fn test_assistant_turn_with_tool_calls() {
        let turn = Message::assistant_turn(&AggregateResult {
            tool_calls: vec![
                ToolCall::from_raw("call_0", "add", r#"{"a":1}"#),
                ToolCall::from_raw("call_1", "sub", r#"{"a":"#),
            ],
            ..Default::default()
        });
        let messages = to_openai_messages("", &[turn], false).unwrap();
        let wire = &messages[0];

        assert_eq!(wire.role, "assistant");
        assert_eq!(wire.content, Some(OpenAIContent::Text(String::new())));
        let calls = wire.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.arguments, r#"{"a":1}"#);
        // malformed arguments are echoed verbatim
        assert_eq!(calls[1].function.arguments, r#"{"a":"#);
    }

    #[test]
    fn test_tool_results_become_tool_messages() {
        let msg = Message::new(
            MessageRole::Tool,
            vec![
                ContentBlock::ToolResult(crate::types::ToolResultBlock::new("a", "1")),
                ContentBlock::ToolResult(crate::types::ToolResultBlock::new("b", "2")),
            ],
        );
        let messages = to_openai_messages("", &[msg], false).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, "tool");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_tool_message_without_result_block_rejected() {
        let msg = Message::new(MessageRole::Tool, vec![ContentBlock::text("42")]);
        match to_openai_messages("", &[msg], false) {
            Err(Error::InvalidInput(message)) => {
                assert!(message.contains("Message::tool_result"), "got {}", message)
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_image_url_passes_through() {
        let msg = Message::user_with_image_url("what is this?", "https://example.com/cat.jpg");
        let messages = to_openai_messages("", &[msg], false).unwrap();
        assert_eq!(
            messages[0].content,
            Some(OpenAIContent::Parts(vec![
                OpenAIContentPart::text("what is this?"),
                OpenAIContentPart::image_url("https://example.com/cat.jpg"),
            ]))
        );
    }

    #[test]
    fn test_local_image_needs_vllm_mode() {
        let msg = Message::user_with_blocks(vec![ContentBlock::image_bytes(vec![1, 2, 3], None)]);
        match to_openai_messages("", &[msg], false) {
            Err(Error::InvalidInput(message)) => assert!(message.contains("vllm_mode")),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_image_bytes_inlined() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A];
        let msg = Message::user_with_blocks(vec![
            ContentBlock::image_bytes(png.to_vec(), None),
            ContentBlock::image_bytes(vec![0, 0], Some("image/jpeg".to_string())),
        ]);
        let messages = to_openai_messages("", &[msg], true).unwrap();
        let Some(OpenAIContent::Parts(parts)) = &messages[0].content else {
            panic!("Expected content parts");
        };
        assert_eq!(parts[0], OpenAIContentPart::image_url(format!("data:image/png;base64,{}", BASE64.encode(png))));
        assert_eq!(parts[1], OpenAIContentPart::image_url("data:image/jpeg;base64,AAA="));
    }

    #[test]
    fn test_image_on_assistant_rejected() {
        let msg = Message::new(
            MessageRole::Assistant,
            vec![ContentBlock::image_url("https://example.com/x.png")],
        );
        assert!(matches!(
            to_openai_messages("", &[msg], true),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_image_file() {
        let msg = Message::user_with_image_path("look", "/definitely/not/here.png");
        match to_openai_messages("", &[msg], true) {
            Err(Error::Image { path, .. }) => {
                assert_eq!(path, Path::new("/definitely/not/here.png"))
            }
            other => panic!("Expected image error, got {:?}", other),
        }
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_image_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(b"??"), "image/png");
    }
}
