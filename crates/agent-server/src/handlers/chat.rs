use actix_web::{web, HttpResponse};
use agent_loop::{run_agent_loop, ToolCallRecord};
use serde::{Deserialize, Serialize};

use super::{require_message, resolve_session_id};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

/// Run one turn to completion and return the final answer.
pub async fn handler(state: web::Data<AppState>, req: web::Json<ChatRequest>) -> Result<HttpResponse> {
    let req = req.into_inner();
    let message = require_message(req.message.as_deref())?;
    let session_id = resolve_session_id(req.session_id.as_deref());

    let _lock = state.lock_session(&session_id).await;
    let mut session = state.load_or_create_session(&session_id).await?;
    let turn = state.begin_turn(&session_id);

    log::info!(
        "[{}] Chat turn started ({} prior messages)",
        session_id,
        session.messages.len()
    );

    let outcome = run_agent_loop(
        &mut session,
        message,
        None,
        state.llm.clone(),
        state.tools.clone(),
        turn.token(),
        state.loop_config.clone(),
    )
    .await
    .map_err(|error| {
        log::error!("[{}] Chat turn failed: {}", session_id, error);
        error
    })?;

    log::info!(
        "[{}] Chat turn finished in {} rounds with {} tool calls",
        session_id,
        outcome.rounds,
        outcome.tool_calls.len()
    );

    let tool_calls = (!outcome.tool_calls.is_empty()).then_some(outcome.tool_calls);
    Ok(HttpResponse::Ok().json(ChatResponse {
        response: outcome.answer,
        session_id,
        tool_calls,
    }))
}

