use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use agent_core::AgentEvent;
use agent_loop::agent_event_stream;
use futures::StreamExt;
use serde::Deserialize;

use super::{require_message, resolve_session_id};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

/// Run one turn and stream its events as server-sent events.
///
/// The turn starts when the body is first polled and is cancelled when the
/// client goes away.
pub async fn handler(
    state: web::Data<AppState>,
    query: web::Query<StreamQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let message = require_message(query.message.as_deref())?;
    let session_id = resolve_session_id(query.session_id.as_deref());
    let state = state.into_inner();

    log::info!("[{}] Stream requested", session_id);

    let body = async_stream::stream! {
        let _lock = state.lock_session(&session_id).await;
        let turn = state.begin_turn(&session_id);

        let session = match state.load_or_create_session(&session_id).await {
            Ok(session) => session,
            Err(error) => {
                log::error!("[{}] Failed to load session: {}", session_id, error);
                let event = AgentEvent::Error { message: error.to_string() };
                yield Ok::<_, actix_web::Error>(Bytes::from(event.to_sse()));
                return;
            }
        };

        let events = agent_event_stream(
            session,
            message,
            state.llm.clone(),
            state.tools.clone(),
            turn.token(),
            state.loop_config.clone(),
        );
        futures::pin_mut!(events);

        let mut count = 0usize;
        while let Some(event) = events.next().await {
            count += 1;
            match &event {
                AgentEvent::Done => {
                    log::info!("[{}] Stream completed: {} events", session_id, count);
                }
                AgentEvent::Error { message } => {
                    log::error!("[{}] Stream error: {}", session_id, message);
                }
                _ => {}
            }
            yield Ok(Bytes::from(event.to_sse()));
        }
    };

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}
