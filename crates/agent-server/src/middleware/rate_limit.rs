use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use dashmap::DashMap;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{api_key, is_exempt};
use crate::error::ApiError;

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed one-minute windows keyed by client.
pub struct RateLimitStore {
    limit: u32,
    window: Duration,
    clients: DashMap<String, Window>,
}

impl RateLimitStore {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request for `client`; false once the window is exhausted.
    pub fn check(&self, client: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Throttles each client (API key, else peer address) to a fixed number of
/// requests per minute.
#[derive(Clone)]
pub struct RateLimit {
    store: Arc<RateLimitStore>,
}

impl RateLimit {
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_store(Arc::new(RateLimitStore::new(limit_per_minute)))
    }

    pub fn with_store(store: Arc<RateLimitStore>) -> Self {
        Self { store }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            store: Arc::clone(&self.store),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    store: Arc<RateLimitStore>,
}

fn client_key(req: &ServiceRequest) -> String {
    api_key(req)
        .map(|key| format!("key:{}", key))
        .or_else(|| req.peer_addr().map(|addr| format!("ip:{}", addr.ip())))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !is_exempt(req.path()) {
            let client = client_key(&req);
            if !self.store.check(&client) {
                log::warn!("Rate limit exceeded for {} on {}", client, req.path());
                let response = req.error_response(ApiError::RateLimited(self.store.limit()));
                return Box::pin(async move { Ok(response.map_into_right_body()) });
            }
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_per_client() {
        let store = RateLimitStore::new(2);
        assert!(store.check("a"));
        assert!(store.check("a"));
        assert!(!store.check("a"));
        assert!(store.check("b"));
    }

    #[test]
    fn window_resets() {
        let store = RateLimitStore::with_window(1, Duration::from_millis(20));
        assert!(store.check("a"));
        assert!(!store.check("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.check("a"));
    }

    #[test]
    fn zero_disables_limit() {
        let store = RateLimitStore::new(0);
        for _ in 0..1000 {
            assert!(store.check("a"));
        }
    }
}
