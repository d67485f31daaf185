use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::state::AppState;

/// Reset a conversation: stop any running turn and drop its checkpoint.
pub async fn delete(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();

    let cancelled = state.cancel_turn(&session_id);
    // A cancelled turn still writes its final checkpoint; delete after it lets go.
    let _lock = state.lock_session(&session_id).await;
    let deleted = state.storage.delete_session(&session_id).await?;

    log::info!(
        "[{}] Session reset (checkpoint deleted: {}, turn cancelled: {})",
        session_id,
        deleted,
        cancelled
    );

    Ok(HttpResponse::Ok().json(json!({
        "session_id": session_id,
        "deleted": deleted,
    })))
}
