use futures::StreamExt;

use agent_core::tools::ToolCallAccumulator;
use agent_core::{AgentError, Message};
use agent_llm::{LLMChunk, LLMStream};

/// Drain one model stream into exactly one assistant message.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    session_id: &str,
) -> Result<Message, AgentError> {
    let mut content = String::new();
    let mut tool_calls = ToolCallAccumulator::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(LLMChunk::Token(token)) => content.push_str(&token),
            Ok(LLMChunk::ToolCalls(parts)) => {
                log::debug!("[{}] Received {} tool call parts", session_id, parts.len());
                tool_calls.extend(parts);
            }
            Ok(LLMChunk::Done) => break,
            Err(error) => {
                return Err(AgentError::ModelBackend(format!("Stream error: {error}")));
            }
        }
    }

    let tool_calls = tool_calls.finalize();
    Ok(Message::assistant(
        content,
        (!tool_calls.is_empty()).then_some(tool_calls),
    ))
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use agent_core::tools::ToolCall;
    use agent_core::Role;
    use agent_llm::{LLMError, LLMStream};

    use super::*;

    fn build_stream(items: Vec<Result<LLMChunk, LLMError>>) -> LLMStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn merges_tokens_and_tool_call_fragments() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("Let me ".to_string())),
            Ok(LLMChunk::Token("check.".to_string())),
            Ok(LLMChunk::ToolCalls(vec![ToolCall::new("call_1", "calculate", "{\"expression\":")])),
            Ok(LLMChunk::ToolCalls(vec![ToolCall::new("call_1", "", " \"1+1\"}")])),
            Ok(LLMChunk::Done),
        ]);

        let message = consume_llm_stream(stream, "s1").await.unwrap();

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Let me check.");
        assert_eq!(message.tool_requests().len(), 1);
        assert_eq!(message.tool_requests()[0].function.name, "calculate");
        assert_eq!(
            message.tool_requests()[0].function.arguments,
            "{\"expression\": \"1+1\"}"
        );
    }

    #[tokio::test]
    async fn plain_answer_has_no_tool_requests() {
        let stream = build_stream(vec![Ok(LLMChunk::Token("4".to_string()))]);
        let message = consume_llm_stream(stream, "s1").await.unwrap();
        assert!(!message.has_tool_requests());
        assert!(message.tool_calls.is_none());
    }

    #[tokio::test]
    async fn stream_error_is_a_model_failure() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("partial".to_string())),
            Err(LLMError::Stream("connection reset".to_string())),
        ]);
        let error = consume_llm_stream(stream, "s1").await.unwrap_err();
        assert!(matches!(error, AgentError::ModelBackend(_)));
    }
}
