use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

/// The merged catalog the model sees.
pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({ "tools": state.tools.list_tools() }))
}
