use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::collections::HashSet;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use super::{api_key, is_exempt};
use crate::error::ApiError;

/// Rejects requests without a known `X-API-Key` when enabled.
#[derive(Clone)]
pub struct ApiKeyAuth {
    enabled: bool,
    keys: Arc<HashSet<String>>,
}

impl ApiKeyAuth {
    pub fn new(enabled: bool, keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            enabled,
            keys: Arc::new(keys.into_iter().collect()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, Vec::new())
    }

    fn accepts(&self, key: Option<&str>) -> bool {
        key.is_some_and(|key| self.keys.contains(key))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthService {
            service: Rc::new(service),
            auth: self.clone(),
        }))
    }
}

pub struct ApiKeyAuthService<S> {
    service: Rc<S>,
    auth: ApiKeyAuth,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthService<S>
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
        if self.auth.enabled
            && !is_exempt(req.path())
            && !self.auth.accepts(api_key(&req).as_deref())
        {
            log::warn!("Rejected {} {}: invalid or missing API key", req.method(), req.path());
            let response = req.error_response(ApiError::Unauthorized);
            return Box::pin(async move { Ok(response.map_into_right_body()) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
