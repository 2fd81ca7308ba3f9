use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    // Deliberately loose local@domain.tld shape; deliverability is proven by
    // the verification email, not the syntax check.
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// Durable account state as held by the user store. The password is kept only
/// as a bcrypt hash and the struct is never serialized to clients as-is.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    /// Present only while email verification is pending; cleared on consumption.
    pub verification_token: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal profile exposed on login and `/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters long"))]
    pub name: String,
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(regex(path = *EMAIL_RE, message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

impl RegisterRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }
}

impl LoginRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }
}

impl ForgotPasswordRequest {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Session token claims: user identity and role, signed and time-bounded.
/// Integrity-protected, not confidential.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthError;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let mut request = RegisterRequest {
            name: "Ann Lee".to_string(),
            email: " Ann@Example.com ".to_string(),
            password: "secret1".to_string(),
        };
        request.normalize();
        assert_eq!(request.email, "ann@example.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn every_violated_rule_is_reported() {
        let mut request = RegisterRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
        };
        request.normalize();
        let err = AuthError::from(request.validate().unwrap_err());
        match err {
            AuthError::Validation(messages) => {
                assert_eq!(messages.len(), 3);
                assert!(messages.iter().any(|m| m.contains("Name")));
                assert!(messages.iter().any(|m| m.contains("email")));
                assert!(messages.iter().any(|m| m.contains("Password")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_requires_a_domain_with_tld() {
        for bad in ["user@localhost", "user@", "@example.com", "a b@example.com"] {
            let request = LoginRequest {
                email: bad.to_string(),
                password: "secret1".to_string(),
            };
            assert!(request.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), "\"user\"");
        assert_eq!(UserRole::from_str("admin"), UserRole::Admin);
        assert_eq!(UserRole::from_str("anything-else"), UserRole::User);
    }
}
