use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{execute_tool_call, parse_tool_args, ToolCall, ToolExecutor, ToolResult};
use agent_core::{AgentError, AgentEvent, Message, Session};
use agent_llm::LLMProvider;

use crate::config::AgentLoopConfig;
use crate::stream::handler::consume_llm_stream;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Deciding,
    Acting,
    Done,
    Failed,
}

/// DECIDING moves to ACTING iff the latest assistant message requested tools.
pub fn should_continue(last: &Message) -> LoopState {
    if last.has_tool_requests() {
        LoopState::Acting
    } else {
        LoopState::Done
    }
}

/// One tool invocation made during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
    pub success: bool,
}

impl ToolCallRecord {
    fn new(call: &ToolCall, result: &ToolResult) -> Self {
        Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: display_arguments(call),
            result: result.result_value(),
            success: result.is_success(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub rounds: usize,
}

/// Run one turn: append `message` and alternate model calls and tool
/// execution until the model answers without requesting tools.
///
/// Events are sent on `events` when a consumer is attached; the loop behaves
/// the same without one. The session is checkpointed after every completed
/// round and once more when the turn ends, whatever the outcome.
pub async fn run_agent_loop(
    session: &mut Session,
    message: String,
    events: Option<mpsc::Sender<AgentEvent>>,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    cancel: CancellationToken,
    config: AgentLoopConfig,
) -> Result<TurnOutcome> {
    let debug_logger = DebugLogger::new(config.trace);
    let session_id = session.id.clone();
    let events = EventSink(events);

    log::debug!("[{}] Starting agent loop with message: {}", session_id, message);
    debug_logger.log_event(
        &session_id,
        "agent_loop_start",
        serde_json::json!({
            "max_rounds": config.max_rounds,
            "initial_message_count": session.messages.len(),
            "parallel_tools": config.parallel_tools,
        }),
    );

    if let Some(prompt) = config.system_prompt.as_deref() {
        session.ensure_system_prompt(prompt);
    }
    session.add_message(Message::user(message));

    let mut state = LoopState::Deciding;
    let mut rounds = 0usize;
    let mut records = Vec::new();
    let mut failure = None;

    let outcome = loop {
        match state {
            LoopState::Deciding => {
                if cancel.is_cancelled() {
                    log::info!("[{}] Cancelled before round {}", session_id, rounds + 1);
                    failure = Some(AgentError::Cancelled);
                    state = LoopState::Failed;
                    continue;
                }
                if rounds >= config.max_rounds {
                    log::warn!("[{}] Step limit of {} rounds reached", session_id, rounds);
                    failure = Some(AgentError::StepLimitExceeded(rounds));
                    state = LoopState::Failed;
                    continue;
                }
                rounds += 1;

                let timer = Timer::new("llm_request");
                let reply = match decide(session, llm.as_ref(), tools.as_ref(), &cancel, &config)
                    .await
                {
                    Ok(reply) => reply,
                    Err(error) => {
                        failure = Some(error);
                        state = LoopState::Failed;
                        continue;
                    }
                };
                timer.debug(&session_id);

                let next = should_continue(&reply);
                session.add_message(reply);
                debug_logger.transition(&session_id, rounds, state, next);
                state = next;
            }
            LoopState::Acting => {
                let requests = session
                    .last_message()
                    .map(|message| message.tool_requests().to_vec())
                    .unwrap_or_default();

                for call in &requests {
                    events
                        .send(AgentEvent::ToolCall {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            arguments: display_arguments(call),
                        })
                        .await;
                }

                let results = if config.parallel_tools {
                    act_concurrently(&requests, tools.as_ref(), config.tool_timeout, &events).await
                } else {
                    act_sequentially(&requests, tools.as_ref(), config.tool_timeout, &events).await
                };

                // History order follows request order regardless of completion order.
                for (call, result) in requests.iter().zip(results.iter()) {
                    session.add_message(result.to_message());
                    records.push(ToolCallRecord::new(call, result));
                }

                persist(session, &config).await;
                debug_logger.transition(&session_id, rounds, state, LoopState::Deciding);
                state = LoopState::Deciding;
            }
            LoopState::Done => {
                let answer = session
                    .last_message()
                    .map(|message| message.content.clone())
                    .unwrap_or_default();
                events
                    .send(AgentEvent::Answer {
                        content: answer.clone(),
                    })
                    .await;

                break Ok(TurnOutcome {
                    answer,
                    tool_calls: records,
                    rounds,
                });
            }
            LoopState::Failed => {
                debug_logger.transition(&session_id, rounds, LoopState::Deciding, state);
                break Err(failure
                    .take()
                    .unwrap_or_else(|| AgentError::ModelBackend("turn failed".to_string())));
            }
        }
    };

    persist(session, &config).await;
    match &outcome {
        Ok(turn) => log::info!(
            "[{}] Turn finished after {} rounds with {} tool calls",
            session_id,
            turn.rounds,
            turn.tool_calls.len()
        ),
        Err(error) => log::warn!("[{}] Turn failed: {}", session_id, error),
    }
    outcome
}

/// One DECIDING step: a model call bounded by the model timeout and by
/// cancellation.
async fn decide(
    session: &Session,
    llm: &dyn LLMProvider,
    tools: &dyn ToolExecutor,
    cancel: &CancellationToken,
    config: &AgentLoopConfig,
) -> Result<Message> {
    let catalog = tools.list_tools();
    let call = async {
        let stream = llm
            .chat_stream(&session.messages, &catalog)
            .await
            .map_err(|error| AgentError::ModelBackend(error.to_string()))?;
        consume_llm_stream(stream, &session.id).await
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        outcome = tokio::time::timeout(config.model_timeout, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(AgentError::ModelBackend(format!(
                "model did not respond within {}s",
                config.model_timeout.as_secs_f64()
            ))),
        },
    }
}

async fn act_sequentially(
    requests: &[ToolCall],
    tools: &dyn ToolExecutor,
    timeout: Duration,
    events: &EventSink,
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(requests.len());
    for call in requests {
        let timer = Timer::new(format!("tool_{}", call.function.name));
        let result = execute_tool_call(call, tools, timeout).await;
        log::debug!(
            "Tool '{}' finished in {}ms (success: {})",
            call.function.name,
            timer.elapsed_ms(),
            result.is_success()
        );
        events.send(result.to_event()).await;
        results.push(result);
    }
    results
}

/// Results are emitted in completion order and returned in request order.
async fn act_concurrently(
    requests: &[ToolCall],
    tools: &dyn ToolExecutor,
    timeout: Duration,
    events: &EventSink,
) -> Vec<ToolResult> {
    let mut pending: FuturesUnordered<_> = requests
        .iter()
        .enumerate()
        .map(|(index, call)| async move { (index, execute_tool_call(call, tools, timeout).await) })
        .collect();

    let mut slots: Vec<Option<ToolResult>> = requests.iter().map(|_| None).collect();
    while let Some((index, result)) = pending.next().await {
        events.send(result.to_event()).await;
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

async fn persist(session: &Session, config: &AgentLoopConfig) {
    if let Some(storage) = config.storage.as_ref() {
        if let Err(error) = storage.save_session(session).await {
            log::warn!("[{}] Failed to save checkpoint: {}", session.id, error);
        } else {
            log::debug!("[{}] Checkpoint saved ({} messages)", session.id, session.messages.len());
        }
    }
}

fn display_arguments(call: &ToolCall) -> Value {
    parse_tool_args(&call.function.arguments)
        .unwrap_or_else(|_| Value::String(call.function.arguments.clone()))
}

/// Optional event channel. A missing or departed consumer is not an error.
struct EventSink(Option<mpsc::Sender<AgentEvent>>);

impl EventSink {
    async fn send(&self, event: AgentEvent) {
        if let Some(tx) = self.0.as_ref() {
            let _ = tx.send(event).await;
        }
    }
}

struct DebugLogger {
    trace: bool,
}

impl DebugLogger {
    fn new(trace: bool) -> Self {
        Self { trace }
    }

    fn log_event(&self, session_id: &str, event_type: &str, details: Value) {
        if self.trace {
            log::info!("[{}] {}: {}", session_id, event_type, details);
        } else {
            log::debug!("[{}] {}: {}", session_id, event_type, details);
        }
    }

    fn transition(&self, session_id: &str, round: usize, from: LoopState, to: LoopState) {
        self.log_event(
            session_id,
            "transition",
            serde_json::json!({
                "round": round,
                "from": format!("{from:?}"),
                "to": format!("{to:?}"),
            }),
        );
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn debug(&self, session_id: &str) {
        log::debug!("[{}] {} completed in {}ms", session_id, self.name, self.elapsed_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continues_only_when_tools_were_requested() {
        let answer = Message::assistant("done", None);
        assert_eq!(should_continue(&answer), LoopState::Done);

        let asks = Message::assistant("", Some(vec![ToolCall::new("c1", "calculate", "{}")]));
        assert_eq!(should_continue(&asks), LoopState::Acting);

        let empty = Message::assistant("", Some(vec![]));
        assert_eq!(should_continue(&empty), LoopState::Done);
    }

    #[test]
    fn unparseable_arguments_are_shown_raw() {
        let call = ToolCall::new("c1", "calculate", "{not json");
        assert_eq!(display_arguments(&call), Value::String("{not json".to_string()));
    }
}
