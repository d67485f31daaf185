use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::ToolExecutor;
use agent_core::{AgentEvent, Session};
use agent_llm::LLMProvider;

use crate::config::AgentLoopConfig;
use crate::runner::run_agent_loop;

const EVENT_BUFFER: usize = 64;

enum Step<T> {
    Event(Option<AgentEvent>),
    Finished(T),
}

/// Run a turn as a lazy event stream.
///
/// Nothing happens until the stream is polled. The loop's events are yielded
/// as they occur, followed by exactly one `done` (success) or `error`
/// (failure or cancellation). Dropping the stream cancels `cancel` and
/// abandons the turn.
pub fn agent_event_stream(
    mut session: Session,
    message: String,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    cancel: CancellationToken,
    config: AgentLoopConfig,
) -> impl Stream<Item = AgentEvent> + Send + 'static {
    let guard = cancel.clone().drop_guard();

    stream! {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);

        let run = run_agent_loop(&mut session, message, Some(tx), llm, tools, cancel, config);
        tokio::pin!(run);

        let outcome = loop {
            let step = tokio::select! {
                biased;
                event = rx.recv() => Step::Event(event),
                outcome = &mut run => Step::Finished(outcome),
            };

            match step {
                Step::Event(Some(event)) => yield event,
                // The sender lives inside the loop, so a closed channel means
                // the loop is about to return.
                Step::Event(None) => break (&mut run).await,
                Step::Finished(outcome) => break outcome,
            }
        };

        while let Ok(event) = rx.try_recv() {
            yield event;
        }

        guard.disarm();
        match outcome {
            Ok(_) => yield AgentEvent::Done,
            Err(error) => yield AgentEvent::Error {
                message: error.to_string(),
            },
        }
    }
}
