use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::config::Settings;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{ApiKeyAuth, RateLimit};
use crate::state::AppState;

/// Register routes and extractor error handling on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(handlers::health::handler))
    .route("/chat", web::post().to(handlers::chat::handler))
    .route("/chat/stream", web::get().to(handlers::stream::handler))
    .route(
        "/history/{session_id}",
        web::get().to(handlers::history::handler),
    )
    .route(
        "/sessions/{session_id}",
        web::delete().to(handlers::sessions::delete),
    )
    .route("/stop/{session_id}", web::post().to(handlers::stop::handler))
    .route("/tools", web::get().to(handlers::tools::handler));
}

pub fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Cors::permissive();
    }

    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

pub async fn run_server(settings: Settings) -> io::Result<()> {
    let state = web::Data::new(
        AppState::from_settings(&settings)
            .await
            .map_err(io::Error::other)?,
    );

    let auth = ApiKeyAuth::new(settings.auth_enabled, settings.api_keys());
    let rate_limit = RateLimit::new(settings.rate_limit_per_minute);
    let origins = settings.cors_origins();
    if settings.auth_enabled {
        log::info!("API key authentication enabled");
    }

    log::info!("Listening on {}:{}", settings.host, settings.port);
    let app_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(rate_limit.clone())
            .wrap(auth.clone())
            .wrap(build_cors(&origins))
            .configure(configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await;

    state.shutdown().await;
    result
}
