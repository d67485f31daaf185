use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let cancelled = state.cancel_turn(&session_id);

    if cancelled {
        log::info!("[{}] Stop requested, cancelling turn", session_id);
    } else {
        log::debug!("[{}] Stop requested but no turn is running", session_id);
    }

    HttpResponse::Ok().json(json!({
        "session_id": session_id,
        "cancelled": cancelled,
    }))
}
