//! OpenAI-compatible chat completion wire format.
//!
//! OpenRouter and OpenAI share this shape. Internal message fields such as
//! `id`, `created_at` and `tool_name` never reach the wire.

use agent_core::{
    agent::Role,
    tools::{FunctionCall, ToolCall, ToolSchema},
    Message,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::Result;
use crate::types::LLMChunk;

#[derive(Debug, Clone, Copy)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

pub fn messages_to_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let mut entry = json!({
                "role": role,
                "content": message.content,
            });

            if let Some(tool_call_id) = &message.tool_call_id {
                entry["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(tool_calls) = message.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
                entry["tool_calls"] = json!(tool_calls);
            }

            entry
        })
        .collect()
}

pub fn build_request_body(
    model: &str,
    messages: &[Message],
    tools: &[ToolSchema],
    options: SamplingOptions,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_compat_json(messages),
        "stream": true,
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
    });

    if !tools.is_empty() {
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }

    body
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Parse one SSE `data:` payload. `[DONE]` ends the stream; a chunk
/// without anything useful yields `Ok(None)`.
pub fn parse_sse_data(data: &str) -> Result<Option<LLMChunk>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(LLMChunk::Done));
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    if let Some(deltas) = choice.delta.tool_calls {
        let calls: Vec<ToolCall> = deltas
            .into_iter()
            .map(|delta| {
                let (name, arguments) = delta
                    .function
                    .map(|function| {
                        (
                            function.name.unwrap_or_default(),
                            function.arguments.unwrap_or_default(),
                        )
                    })
                    .unwrap_or_default();
                ToolCall {
                    id: delta.id.unwrap_or_default(),
                    tool_type: "function".to_string(),
                    function: FunctionCall { name, arguments },
                }
            })
            .collect();

        if !calls.is_empty() {
            return Ok(Some(LLMChunk::ToolCalls(calls)));
        }
    }

    Ok(choice
        .delta
        .content
        .filter(|content| !content.is_empty())
        .map(LLMChunk::Token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tools::FunctionSchema;

    #[test]
    fn wire_messages_omit_internal_fields() {
        let messages = vec![
            Message::user("Hello"),
            Message::tool_result("call_1", "calculate", "4.0"),
        ];
        let json = messages_to_compat_json(&messages);

        assert_eq!(json[0], json!({"role": "user", "content": "Hello"}));
        assert_eq!(json[1]["tool_call_id"], "call_1");
        assert!(json[1].get("tool_name").is_none());
        assert!(json[1].get("id").is_none());
    }

    #[test]
    fn body_carries_sampling_options_and_tools() {
        let tools = vec![ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: "calculate".to_string(),
                description: "math".to_string(),
                parameters: json!({"type": "object"}),
            },
        }];
        let options = SamplingOptions {
            temperature: 0.5,
            max_tokens: 256,
        };

        let body = build_request_body("openai/gpt-4o", &[Message::user("hi")], &tools, options);
        assert_eq!(body["model"], "openai/gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["function"]["name"], "calculate");

        let bare = build_request_body("m", &[], &[], options);
        assert!(bare.get("tools").is_none());
    }

    #[test]
    fn parses_content_and_tool_call_deltas() {
        let token = parse_sse_data(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(token, Some(LLMChunk::Token("Hi".to_string())));

        let call = parse_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"calculate","arguments":"{\"expr"}}]}}]}"#,
        )
        .unwrap();
        match call {
            Some(LLMChunk::ToolCalls(calls)) => {
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "calculate");
                assert_eq!(calls[0].function.arguments, "{\"expr");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }

        assert_eq!(parse_sse_data("[DONE]").unwrap(), Some(LLMChunk::Done));
        assert_eq!(parse_sse_data(r#"{"choices":[]}"#).unwrap(), None);
        assert!(parse_sse_data("not json").is_err());
    }
}
