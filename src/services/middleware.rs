use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error as ActixError, HttpMessage, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use serde_json::json;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::models::Claims;
use crate::services::tokens::SessionSigner;

/// Name of the session cookie set at login and read on protected requests.
pub const SESSION_COOKIE: &str = "token";

/// Gate in front of protected handlers: extracts the session token from the
/// `token` cookie (or a Bearer header), verifies signature and expiry, and
/// attaches the claims to the request. Missing, invalid and expired tokens
/// are all 401-class rejections; the handler never runs.
#[derive(Clone)]
pub struct SessionAuth {
    signer: SessionSigner,
}

impl SessionAuth {
    pub fn new(signer: SessionSigner) -> Self {
        Self { signer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = SessionAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthMiddleware {
            service: Rc::new(service),
            signer: self.signer.clone(),
        }))
    }
}

pub struct SessionAuthMiddleware<S> {
    service: Rc<S>,
    signer: SessionSigner,
}

impl<S, B> Service<ServiceRequest> for SessionAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let signer = self.signer.clone();
        let token = session_token(&req);

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => return Ok(reject(req, "Authentication Failed")),
            };

            match signer.verify(&token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(e) => {
                    tracing::warn!("session token rejected: {}", e);
                    Ok(reject(req, "Invalid or expired token"))
                }
            }
        })
    }
}

fn session_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.request().cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|t| t.to_string())
}

fn reject<B>(req: ServiceRequest, message: &str) -> ServiceResponse<EitherBody<B>> {
    req.into_response(HttpResponse::Unauthorized().json(json!({
        "message": message,
        "success": false
    })))
    .map_into_right_body()
}

/// Claims attached by the middleware, for use inside protected handlers.
pub fn extract_claims(req: &actix_web::HttpRequest) -> Option<Claims> {
    req.extensions().get::<Claims>().cloned()
}
