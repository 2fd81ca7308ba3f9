use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Tagged error taxonomy for every authentication flow. Handlers return these
/// directly; the single `ResponseError` impl below is the only place error
/// kinds are mapped to HTTP statuses.
///
/// The client-facing messages are deliberately coarse: "email not found" and
/// "wrong password" share `InvalidCredentials`, and "invalid" and "expired"
/// tokens share `InvalidToken`, so callers cannot enumerate accounts.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<String>),
    #[error("User already exists")]
    DuplicateAccount,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please verify your email before logging in")]
    UnverifiedAccount,
    #[error("Authentication Failed")]
    Unauthenticated,
    #[error("Too many attempts. Please try again later.")]
    RateLimited,
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err)
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |err| match &err.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AuthError::Validation(messages)
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::DuplicateAccount
            | AuthError::InvalidToken
            | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::UnverifiedAccount => StatusCode::FORBIDDEN,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Infrastructure failures are logged with full detail server-side but
        // never exposed to the client.
        if let AuthError::Internal(err) = self {
            tracing::error!("internal error: {:#}", err);
        }

        let mut body = json!({
            "message": self.to_string(),
            "success": false,
        });
        if let AuthError::Validation(errors) = self {
            body["errors"] = json!(errors);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
