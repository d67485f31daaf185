use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();

    match state.storage.load_session(&session_id).await? {
        Some(session) => Ok(HttpResponse::Ok().json(json!({
            "session_id": session.id,
            "messages": session.messages,
        }))),
        None => Err(ApiError::NotFound(format!(
            "Session {} not found",
            session_id
        ))),
    }
}
