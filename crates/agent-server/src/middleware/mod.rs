pub mod auth;
pub mod rate_limit;

pub use auth::ApiKeyAuth;
pub use rate_limit::{RateLimit, RateLimitStore};

use actix_web::dev::ServiceRequest;

/// Paths reachable without a key and never throttled.
pub(crate) fn is_exempt(path: &str) -> bool {
    path == "/health"
}

/// Value of the `X-API-Key` header, if present and valid UTF-8.
pub(crate) fn api_key(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("X-API-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
