use actix_web::{
    cookie::{time, Cookie},
    web, HttpRequest, HttpResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AuthError;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
    UserProfile,
};
use crate::services::{
    extract_claims, middleware::SESSION_COOKIE, tokens::SESSION_TTL_HOURS, AccountService,
    RateLimits, SessionAuth, UserStore,
};

pub async fn register(
    request: web::Json<RegisterRequest>,
    accounts: web::Data<AccountService>,
    limits: web::Data<RateLimits>,
    req: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    let client_ip = client_ip(&req);
    if !limits.check_register(&client_ip) {
        tracing::warn!(%client_ip, "rate limit exceeded for registration");
        return Err(AuthError::RateLimited);
    }

    let mut body = request.into_inner();
    body.normalize();
    body.validate()?;

    accounts.register(&body).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully. Please check your email to verify.",
        "success": true
    })))
}

pub async fn verify(
    path: web::Path<String>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AuthError> {
    let token = path.into_inner();
    accounts.verify_email(&token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Email verified successfully",
        "success": true
    })))
}

pub async fn login(
    request: web::Json<LoginRequest>,
    accounts: web::Data<AccountService>,
    limits: web::Data<RateLimits>,
    req: HttpRequest,
) -> Result<HttpResponse, AuthError> {
    let client_ip = client_ip(&req);
    if !limits.check_login(&client_ip) {
        tracing::warn!(%client_ip, "rate limit exceeded for login");
        return Err(AuthError::RateLimited);
    }

    let mut body = request.into_inner();
    body.normalize();
    body.validate()?;

    let (user, token, _expires_at) = accounts.login(&body).await?;

    let cookie = Cookie::build(SESSION_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
        message: "User logged in successfully".to_string(),
        success: true,
        token,
        user: UserProfile::from(user),
    }))
}

pub async fn me(
    req: HttpRequest,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AuthError> {
    let claims = extract_claims(&req).ok_or(AuthError::Unauthenticated)?;
    let user_id: Uuid = claims.sub.parse().map_err(|_| AuthError::Unauthenticated)?;

    let user = accounts.profile(user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": UserProfile::from(user)
    })))
}

pub async fn logout(req: HttpRequest) -> Result<HttpResponse, AuthError> {
    extract_claims(&req).ok_or(AuthError::Unauthenticated)?;

    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(true)
        .finish();
    cookie.make_removal();

    Ok(HttpResponse::Ok().cookie(cookie).json(json!({
        "message": "User logged out successfully",
        "success": true
    })))
}

pub async fn forgot_password(
    request: web::Json<ForgotPasswordRequest>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AuthError> {
    let mut body = request.into_inner();
    body.normalize();
    body.validate()?;

    accounts.forgot_password(&body).await?;

    // Identical response whether or not the account exists.
    Ok(HttpResponse::Ok().json(json!({
        "message": "If an account with that email exists, we've sent a password reset link.",
        "success": true
    })))
}

pub async fn reset_password(
    path: web::Path<String>,
    request: web::Json<ResetPasswordRequest>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AuthError> {
    let body = request.into_inner();
    body.validate()?;

    let token = path.into_inner();
    accounts.reset_password(&token, &body).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password has been reset successfully. You can now log in with your new password.",
        "success": true
    })))
}

pub async fn healthz(store: web::Data<dyn UserStore>) -> HttpResponse {
    let store_status = match store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!("store health check failed: {}", e);
            "disconnected"
        }
    };

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "identity-service",
        "store": store_status,
        "timestamp": chrono::Utc::now()
    }))
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// Mounts the user routes; the session middleware wraps only the protected
/// subtree so credential endpoints stay public.
pub fn configure_routes(cfg: &mut web::ServiceConfig, session_auth: SessionAuth) {
    cfg.service(
        web::scope("/api/v1/users")
            .route("/register", web::post().to(register))
            .route("/verify/{token}", web::get().to(verify))
            .route("/login", web::post().to(login))
            .route("/forgot", web::post().to(forgot_password))
            .route("/reset/{token}", web::post().to(reset_password))
            .service(
                web::scope("")
                    .wrap(session_auth)
                    .route("/me", web::get().to(me))
                    .route("/logout", web::post().to(logout)),
            ),
    );
}
