//! Postgres backend (see `schema.sql` for the expected tables).

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    AccountCredential, CredentialStore, Session, SessionStore, StoreError, TwoFactorSettings,
};

/// Implements both store traits over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn credential_from_row(row: &PgRow) -> AccountCredential {
    AccountCredential {
        account_id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        two_factor: TwoFactorSettings {
            enabled: row.get("two_factor_enabled"),
            secret: row.get("two_factor_secret"),
            pending_secret: row.get("two_factor_pending_secret"),
        },
        session_timeout_minutes: row.get("session_timeout_minutes"),
    }
}

fn session_from_row(row: &PgRow) -> Session {
    Session {
        id: row.get("id"),
        account_id: row.get("account_id"),
        client: row.get("client"),
        created_at: row.get("created_at"),
        last_activity_at: row.get("last_activity_at"),
        expires_at: row.get("expires_at"),
    }
}

const CREDENTIAL_COLUMNS: &str = "id, email, password_hash, two_factor_enabled, \
     two_factor_secret, two_factor_pending_secret, session_timeout_minutes";

#[async_trait]
impl CredentialStore for PgStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<AccountCredential>, StoreError> {
        let query = format!("SELECT {CREDENTIAL_COLUMNS} FROM accounts WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup account by email")?;
        Ok(row.as_ref().map(credential_from_row))
    }

    async fn load(&self, account_id: Uuid) -> Result<Option<AccountCredential>, StoreError> {
        let query = format!("SELECT {CREDENTIAL_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to load account credential")?;
        Ok(row.as_ref().map(credential_from_row))
    }

    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let query = r"
            UPDATE accounts
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update password hash")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_pending_secret(
        &self,
        account_id: Uuid,
        pending_secret: &str,
    ) -> Result<bool, StoreError> {
        let query = r"
            UPDATE accounts
            SET two_factor_pending_secret = $2, updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(pending_secret)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to set pending two-factor secret")?;
        Ok(result.rows_affected() > 0)
    }

    async fn promote_pending_secret(&self, account_id: Uuid) -> Result<bool, StoreError> {
        // Single statement so a concurrent disable cannot observe a
        // half-promoted state.
        let query = r"
            UPDATE accounts
            SET two_factor_secret = two_factor_pending_secret,
                two_factor_enabled = TRUE,
                two_factor_pending_secret = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND two_factor_pending_secret IS NOT NULL
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to promote pending two-factor secret")?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_two_factor(&self, account_id: Uuid) -> Result<bool, StoreError> {
        let query = r"
            UPDATE accounts
            SET two_factor_enabled = FALSE,
                two_factor_secret = NULL,
                two_factor_pending_secret = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND two_factor_enabled
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear two-factor settings")?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_session_timeout(
        &self,
        account_id: Uuid,
        minutes: i64,
    ) -> Result<bool, StoreError> {
        let query = r"
            UPDATE accounts
            SET session_timeout_minutes = $2, updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(minutes)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update session timeout")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO account_sessions
                (id, account_id, client, created_at, last_activity_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(session.id)
            .bind(session.account_id)
            .bind(&session.client)
            .bind(session.created_at)
            .bind(session.last_activity_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let query = r"
            SELECT id, account_id, client, created_at, last_activity_at, expires_at
            FROM account_sessions
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to get session")?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let query = r"
            SELECT id, account_id, client, created_at, last_activity_at, expires_at
            FROM account_sessions
            WHERE account_id = $1
            ORDER BY last_activity_at DESC
        ";
        let rows = sqlx::query(query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list sessions")?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn update_activity(
        &self,
        session_id: Uuid,
        last_activity_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let query = r"
            UPDATE account_sessions
            SET last_activity_at = $2, expires_at = $3
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(session_id)
            .bind(last_activity_at)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update session activity")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM account_sessions WHERE id = $1";
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_except(&self, account_id: Uuid, keep: Uuid) -> Result<u64, StoreError> {
        let query = r"
            DELETE FROM account_sessions
            WHERE account_id = $1
              AND id <> $2
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(keep)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete other sessions")?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(
        &self,
        account_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let query = r"
            DELETE FROM account_sessions
            WHERE account_id = $1
              AND expires_at < $2
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}
