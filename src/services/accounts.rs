use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AuthError;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, User,
};
use crate::services::mailer::{self, Mailer};
use crate::services::store::{NewUser, StoreError, UserStore};
use crate::services::tokens::{self, SessionSigner};

const RESET_TOKEN_TTL_HOURS: i64 = 1;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AuthError::DuplicateAccount,
            StoreError::Backend(err) => AuthError::Internal(err),
        }
    }
}

/// Orchestrates the registration → verification → login progression over the
/// store and mailer seams. Inputs are expected to be normalized and validated
/// by the boundary layer before they reach these flows.
pub struct AccountService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    signer: SessionSigner,
    base_url: String,
    rng: SystemRandom,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        signer: SessionSigner,
        base_url: String,
    ) -> Self {
        Self {
            store,
            mailer,
            signer,
            base_url,
            rng: SystemRandom::new(),
        }
    }

    /// Registration: duplicate check, create unverified account with a hashed
    /// password and a fresh verification token, then dispatch the
    /// verification email. Success is reported only after dispatch resolves;
    /// a dispatch failure leaves the account created-but-unverified.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(anyhow!("failed to hash password: {}", e)))?;
        let token = tokens::generate_opaque_token(&self.rng)?;

        // The pre-check above is not atomic against a concurrent registration;
        // the store's unique email index breaks the tie and surfaces here as
        // StoreError::Duplicate.
        let user = self
            .store
            .insert(NewUser {
                name: request.name.clone(),
                email: request.email.clone(),
                password_hash,
                verification_token: token.clone(),
            })
            .await?;

        let (subject, text, html) = mailer::verification_email(&self.base_url, &token);
        self.mailer
            .send(&user.email, &subject, &text, &html)
            .await
            .map_err(|e| AuthError::Internal(anyhow!("failed to send verification email: {:#}", e)))?;

        tracing::info!(user_id = %user.id, "registered new account, verification email sent");
        Ok(())
    }

    /// Verification: consume the token exactly once. A missing account
    /// (including an already-consumed token) is indistinguishable from an
    /// expired one.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        match self.store.consume_verification_token(token).await? {
            Some(user_id) => {
                tracing::info!(%user_id, "email verified");
                Ok(())
            }
            None => Err(AuthError::InvalidToken),
        }
    }

    /// Login: unknown email and wrong password produce the same error; an
    /// unverified account is refused before the password is examined.
    pub async fn login(
        &self,
        request: &LoginRequest,
    ) -> Result<(User, String, DateTime<Utc>), AuthError> {
        let user = self
            .store
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_verified {
            return Err(AuthError::UnverifiedAccount);
        }

        let password_matches = bcrypt::verify(&request.password, &user.password_hash)
            .map_err(|e| AuthError::Internal(anyhow!("failed to verify password: {}", e)))?;
        if !password_matches {
            return Err(AuthError::InvalidCredentials);
        }

        let (token, expires_at) = self
            .signer
            .issue(user.id, user.role)
            .map_err(AuthError::Internal)?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok((user, token, expires_at))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// Forgot password: always succeeds from the caller's perspective so the
    /// endpoint cannot be used to enumerate accounts. A dispatch failure is
    /// logged but not surfaced.
    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), AuthError> {
        let user = match self.store.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("password reset requested for unknown email");
                return Ok(());
            }
        };

        let token = tokens::generate_opaque_token(&self.rng)?;
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.store.set_reset_token(user.id, &token, expires_at).await?;

        let (subject, text, html) = mailer::reset_email(&self.base_url, &token);
        if let Err(e) = self.mailer.send(&user.email, &subject, &text, &html).await {
            tracing::error!(user_id = %user.id, "failed to send reset email: {:#}", e);
        } else {
            tracing::info!(user_id = %user.id, "password reset email sent");
        }
        Ok(())
    }

    /// Reset password: the token must match, be unexpired and unused. The
    /// store consumes the token and replaces the hash in a single operation,
    /// so a concurrent attempt with the same token finds nothing left.
    pub async fn reset_password(
        &self,
        token: &str,
        request: &ResetPasswordRequest,
    ) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(anyhow!("failed to hash password: {}", e)))?;

        match self.store.consume_reset_token(token, &password_hash).await? {
            Some(user_id) => {
                tracing::info!(%user_id, "password reset completed");
                Ok(())
            }
            None => Err(AuthError::InvalidToken),
        }
    }
}
