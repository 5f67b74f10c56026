//! Storage seams for account credentials and sessions.
//!
//! The facade and the domain services only see the `CredentialStore`
//! and `SessionStore` traits. Production runs on the Postgres backend;
//! tests and local development use the in-memory backend.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Account-wide session timeout applied when no preference is stored,
/// in minutes (30 days).
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 43200;

/// Storage failures are transient from the caller's point of view:
/// safe to retry, never a statement about the targeted record.
#[derive(Debug, Error)]
#[error("storage unavailable: {0}")]
pub struct StoreError(#[from] pub anyhow::Error);

/// Two-factor slots on an account credential.
///
/// `secret` is only ever set by promoting a verified `pending_secret`;
/// a pending secret must never be treated as active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoFactorSettings {
    pub enabled: bool,
    pub secret: Option<String>,
    pub pending_secret: Option<String>,
}

/// Durable per-account credential record.
#[derive(Debug, Clone)]
pub struct AccountCredential {
    pub account_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub two_factor: TwoFactorSettings,
    pub session_timeout_minutes: i64,
}

/// One active authenticated client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Opaque client descriptor (user-agent string), display only.
    pub client: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Read/write contract for account credentials.
///
/// Mutations return `false` when the targeted record (or the expected
/// state, for the two-factor transitions) was not there, so callers can
/// distinguish "nothing to do" from "bad id".
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<AccountCredential>, StoreError>;

    async fn load(&self, account_id: Uuid) -> Result<Option<AccountCredential>, StoreError>;

    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError>;

    /// Overwrite the pending enrollment secret, leaving the active
    /// secret and the enabled flag untouched.
    async fn set_pending_secret(
        &self,
        account_id: Uuid,
        pending_secret: &str,
    ) -> Result<bool, StoreError>;

    /// Atomically promote `pending_secret` to the active secret, set
    /// `enabled`, and clear the pending slot. Returns `false` when no
    /// pending secret exists.
    async fn promote_pending_secret(&self, account_id: Uuid) -> Result<bool, StoreError>;

    /// Clear the active secret, any pending secret, and the enabled
    /// flag. Returns `false` when two-factor was not enabled.
    async fn clear_two_factor(&self, account_id: Uuid) -> Result<bool, StoreError>;

    async fn update_session_timeout(
        &self,
        account_id: Uuid,
        minutes: i64,
    ) -> Result<bool, StoreError>;
}

/// Dumb session persistence; the pruning and expiry policies live in
/// [`crate::session::SessionRegistry`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;

    /// All sessions for an account, most recent activity first.
    async fn list(&self, account_id: Uuid) -> Result<Vec<Session>, StoreError>;

    async fn update_activity(
        &self,
        session_id: Uuid,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError>;

    async fn delete_except(&self, account_id: Uuid, keep: Uuid) -> Result<u64, StoreError>;

    async fn delete_expired(&self, account_id: Uuid, cutoff: DateTime<Utc>)
    -> Result<u64, StoreError>;
}
