// Shared test doubles: an in-memory user store and recording/failing mailers
// standing in for the external collaborators.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use actix_web::web;
use identity_auth::models::{User, UserRole};
use identity_auth::services::{
    AccountService, Mailer, NewUser, SessionSigner, StoreError, UserStore,
};

pub const TEST_SECRET: &str = "test-secret-key";
pub const TEST_BASE_URL: &str = "http://localhost:8000";

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
}

impl MemoryStore {
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate);
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: UserRole::User,
            is_verified: false,
            verification_token: Some(new_user.verification_token),
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn consume_verification_token(&self, token: &str) -> Result<Option<Uuid>, StoreError> {
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|u| u.verification_token.as_deref() == Some(token))
        {
            Some(user) => {
                user.is_verified = true;
                user.verification_token = None;
                user.updated_at = Utc::now();
                Ok(Some(user.id))
            }
            None => Ok(None),
        }
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.reset_token = Some(token.to_string());
            user.reset_token_expires_at = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut users = self.users.lock().unwrap();
        let now = Utc::now();
        match users.iter_mut().find(|u| {
            u.reset_token.as_deref() == Some(token)
                && u.reset_token_expires_at.map_or(false, |at| at > now)
        }) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.reset_token = None;
                user.reset_token_expires_at = None;
                user.updated_at = now;
                Ok(Some(user.id))
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: &str,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text_body: text_body.to_string(),
        });
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _text: &str, _html: &str) -> Result<()> {
        Err(anyhow!("smtp relay unavailable"))
    }
}

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub signer: SessionSigner,
    pub accounts: web::Data<AccountService>,
}

pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let signer = SessionSigner::new(TEST_SECRET);
    let accounts = web::Data::new(AccountService::new(
        store.clone(),
        mailer.clone(),
        signer.clone(),
        TEST_BASE_URL.to_string(),
    ));
    TestHarness {
        store,
        mailer,
        signer,
        accounts,
    }
}

/// Harness whose mailer fails every dispatch.
pub fn harness_with_failing_mailer() -> TestHarness {
    let store = Arc::new(MemoryStore::default());
    let signer = SessionSigner::new(TEST_SECRET);
    let accounts = web::Data::new(AccountService::new(
        store.clone(),
        Arc::new(FailingMailer),
        signer.clone(),
        TEST_BASE_URL.to_string(),
    ));
    TestHarness {
        store,
        mailer: Arc::new(RecordingMailer::default()),
        signer,
        accounts,
    }
}
