//! In-memory backend for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccountCredential, CredentialStore, DEFAULT_SESSION_TIMEOUT_MINUTES, Session, SessionStore,
    StoreError, TwoFactorSettings,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, AccountCredential>,
    sessions: HashMap<Uuid, Session>,
}

/// Implements both store traits over a single mutex-guarded map pair.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account; returns its id. Registration proper is an
    /// account-lifecycle concern outside this service.
    pub async fn create_account(&self, email: &str, password_hash: &str) -> Uuid {
        let account_id = Uuid::new_v4();
        let credential = AccountCredential {
            account_id,
            email: email.trim().to_lowercase(),
            password_hash: password_hash.to_string(),
            two_factor: TwoFactorSettings::default(),
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
        };
        self.inner
            .lock()
            .await
            .accounts
            .insert(account_id, credential);
        account_id
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<AccountCredential>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|credential| credential.email == email)
            .cloned())
    }

    async fn load(&self, account_id: Uuid) -> Result<Option<AccountCredential>, StoreError> {
        Ok(self.inner.lock().await.accounts.get(&account_id).cloned())
    }

    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(credential) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        credential.password_hash = password_hash.to_string();
        Ok(true)
    }

    async fn set_pending_secret(
        &self,
        account_id: Uuid,
        pending_secret: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(credential) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        credential.two_factor.pending_secret = Some(pending_secret.to_string());
        Ok(true)
    }

    async fn promote_pending_secret(&self, account_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(credential) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        let Some(pending) = credential.two_factor.pending_secret.take() else {
            return Ok(false);
        };
        credential.two_factor.secret = Some(pending);
        credential.two_factor.enabled = true;
        Ok(true)
    }

    async fn clear_two_factor(&self, account_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(credential) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        if !credential.two_factor.enabled {
            return Ok(false);
        }
        credential.two_factor = TwoFactorSettings::default();
        Ok(true)
    }

    async fn update_session_timeout(
        &self,
        account_id: Uuid,
        minutes: i64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(credential) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        credential.session_timeout_minutes = minutes;
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(&session_id).cloned())
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|session| session.account_id == account_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(sessions)
    }

    async fn update_activity(
        &self,
        session_id: Uuid,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Ok(false);
        };
        session.last_activity_at = last_activity_at;
        session.expires_at = expires_at;
        Ok(true)
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.sessions.remove(&session_id).is_some())
    }

    async fn delete_except(&self, account_id: Uuid, keep: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|id, session| session.account_id != account_id || *id == keep);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn delete_expired(
        &self,
        account_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, session| session.account_id != account_id || session.expires_at >= cutoff);
        Ok((before - inner.sessions.len()) as u64)
    }
}
