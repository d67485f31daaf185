//! Scripted model backend for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agent_core::{
    tools::{ToolCall, ToolSchema},
    Message,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockTurn {
    Chunks(Vec<LLMChunk>),
    Delayed(Duration, Vec<LLMChunk>),
    Fail(String),
}

impl MockTurn {
    pub fn text(text: &str) -> Self {
        MockTurn::Chunks(vec![LLMChunk::Token(text.to_string()), LLMChunk::Done])
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        MockTurn::Chunks(vec![LLMChunk::ToolCalls(calls), LLMChunk::Done])
    }
}

/// Replays scripted turns in order, one per `chat_stream` call.
///
/// Once the script runs out the `repeat` turn is used if set, otherwise the
/// call fails.
pub struct MockLLMProvider {
    turns: Mutex<VecDeque<MockTurn>>,
    repeat: Option<MockTurn>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl MockLLMProvider {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text_response(text: &str) -> Self {
        Self::new(vec![MockTurn::text(text)])
    }

    /// Ask for one tool, then answer with `answer`.
    pub fn with_tool_then_answer(call: ToolCall, answer: &str) -> Self {
        Self::new(vec![MockTurn::tool_calls(vec![call]), MockTurn::text(answer)])
    }

    pub fn always(turn: MockTurn) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(turn);
        provider
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories passed to each call, in call order.
    pub async fn seen_histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn chat_stream(&self, messages: &[Message], _tools: &[ToolSchema]) -> Result<LLMStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().await.push(messages.to_vec());

        let turn = self.turns.lock().await.pop_front().or_else(|| self.repeat.clone());

        let chunks = match turn {
            Some(MockTurn::Chunks(chunks)) => chunks,
            Some(MockTurn::Delayed(delay, chunks)) => {
                tokio::time::sleep(delay).await;
                chunks
            }
            Some(MockTurn::Fail(message)) => return Err(LLMError::Api(message)),
            None => return Err(LLMError::Api("mock script exhausted".to_string())),
        };

        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_turns_in_order_then_fails() {
        let mock = MockLLMProvider::new(vec![MockTurn::text("one"), MockTurn::text("two")]);

        for expected in ["one", "two"] {
            let mut stream = mock.chat_stream(&[], &[]).await.unwrap();
            assert_eq!(
                stream.next().await.unwrap().unwrap(),
                LLMChunk::Token(expected.to_string())
            );
        }

        assert!(mock.chat_stream(&[], &[]).await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn repeat_turn_never_runs_out() {
        let mock = MockLLMProvider::always(MockTurn::text("again"));
        for _ in 0..5 {
            assert!(mock.chat_stream(&[Message::user("x")], &[]).await.is_ok());
        }
        assert_eq!(mock.seen_histories().await.len(), 5);
    }
}
