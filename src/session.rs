//! Active-session inventory and its lifecycle policies.
//!
//! The registry owns the policies the store does not: sliding expiry on
//! `touch`, the lazy expired-session sweep, and the active-session
//! ceiling applied whenever the list is fetched for display. There is
//! no background sweeper; everything happens at read/write time.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::store::{Session, SessionStore, StoreError};

/// Ceiling on active sessions per account. Listing prunes the oldest
/// sessions by `last_activity_at` until this many remain.
pub const MAX_ACTIVE_SESSIONS: usize = 3;

/// Session lifecycle manager over a [`SessionStore`].
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    // Serializes mutating sequences per account so two concurrent list
    // calls never race to terminate the same session twice.
    account_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    fn account_lock(&self, account_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .account_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Allocate a new session with `created_at = last_activity_at = now`
    /// and `expires_at = now + timeout`.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn create(
        &self,
        account_id: Uuid,
        client: &str,
        timeout_minutes: i64,
    ) -> Result<Session, StoreError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            account_id,
            client: client.to_string(),
            created_at: now,
            last_activity_at: now,
            expires_at: now + Duration::minutes(timeout_minutes),
        };
        self.store.insert(&session).await?;
        Ok(session)
    }

    /// Refresh `last_activity_at` and slide `expires_at` forward using
    /// the account's current timeout. Returns `None` for sessions that
    /// were terminated, never existed, or have already expired (an
    /// expired session is removed on the spot).
    ///
    /// Keyed by session id, so it runs outside the account lock; the
    /// store's `update_activity` is a single-row conditional write and
    /// reports a concurrent termination by returning `false`.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn touch(
        &self,
        session_id: Uuid,
        timeout_minutes: i64,
    ) -> Result<Option<Session>, StoreError> {
        let Some(mut session) = self.store.get(session_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.expires_at < now {
            let _ = self.store.delete(session_id).await?;
            return Ok(None);
        }

        session.last_activity_at = now;
        session.expires_at = now + Duration::minutes(timeout_minutes);
        if !self
            .store
            .update_activity(session_id, session.last_activity_at, session.expires_at)
            .await?
        {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Active sessions for display, most recent activity first.
    ///
    /// Not a pure read: expired sessions are swept first, then sessions
    /// beyond [`MAX_ACTIVE_SESSIONS`] are terminated oldest-first. The
    /// prune is idempotent; re-listing immediately never terminates
    /// more sessions.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn list_for_display(&self, account_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        self.store.delete_expired(account_id, Utc::now()).await?;

        let mut sessions = self.store.list(account_id).await?;
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

        if sessions.len() > MAX_ACTIVE_SESSIONS {
            let excess = sessions.split_off(MAX_ACTIVE_SESSIONS);
            for stale in &excess {
                self.store.delete(stale.id).await?;
            }
            info!(
                account_id = %account_id,
                pruned = excess.len(),
                "Pruned sessions beyond the active ceiling"
            );
        }

        Ok(sessions)
    }

    /// Terminate one session. `false` means the id did not exist, was
    /// already terminated, or belongs to a different account.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn terminate(&self, account_id: Uuid, session_id: Uuid) -> Result<bool, StoreError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        let Some(session) = self.store.get(session_id).await? else {
            return Ok(false);
        };
        if session.account_id != account_id {
            return Ok(false);
        }
        self.store.delete(session_id).await
    }

    /// Terminate every other active session for the account ("log out
    /// all other devices"). Returns the number terminated.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn terminate_all_except(
        &self,
        account_id: Uuid,
        keep: Uuid,
    ) -> Result<u64, StoreError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;
        self.store.delete_except(account_id, keep).await
    }

    /// Remove sessions whose `expires_at` is in the past. Returns the
    /// number removed.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn terminate_expired(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;
        self.store.delete_expired(account_id, Utc::now()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{MAX_ACTIVE_SESSIONS, SessionRegistry};
    use crate::store::{MemoryStore, Session, SessionStore};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use uuid::Uuid;

    fn registry() -> (Arc<MemoryStore>, SessionRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new(store.clone());
        (store, registry)
    }

    async fn seed_session(
        store: &MemoryStore,
        account_id: Uuid,
        minutes_ago: i64,
    ) -> Session {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        let session = Session {
            id: Uuid::new_v4(),
            account_id,
            client: "Mozilla/5.0".to_string(),
            created_at: at,
            last_activity_at: at,
            expires_at: at + Duration::minutes(43200),
        };
        store.insert(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn list_prunes_to_ceiling_oldest_first() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        // Five sessions with distinct activity times, oldest first.
        let mut seeded = Vec::new();
        for minutes_ago in [50, 40, 30, 20, 10] {
            seeded.push(seed_session(&store, account, minutes_ago).await);
        }

        let listed = registry.list_for_display(account).await.unwrap();
        assert_eq!(listed.len(), MAX_ACTIVE_SESSIONS);

        // Most recent activity first; the two oldest are gone.
        let listed_ids: Vec<Uuid> = listed.iter().map(|s| s.id).collect();
        assert_eq!(
            listed_ids,
            vec![seeded[4].id, seeded[3].id, seeded[2].id]
        );
        assert!(store.get(seeded[0].id).await.unwrap().is_none());
        assert!(store.get(seeded[1].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_prune_is_idempotent() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        for minutes_ago in [50, 40, 30, 20, 10] {
            seed_session(&store, account, minutes_ago).await;
        }

        let first = registry.list_for_display(account).await.unwrap();
        let second = registry.list_for_display(account).await.unwrap();
        let first_ids: Vec<Uuid> = first.iter().map(|s| s.id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|s| s.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn list_under_ceiling_terminates_nothing() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        for minutes_ago in [20, 10] {
            seed_session(&store, account, minutes_ago).await;
        }
        assert_eq!(registry.list_for_display(account).await.unwrap().len(), 2);
        assert_eq!(store.list(account).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_sweeps_expired_before_pruning() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let live = seed_session(&store, account, 10).await;
        let expired = Session {
            id: Uuid::new_v4(),
            account_id: account,
            client: "old".to_string(),
            created_at: Utc::now() - Duration::minutes(120),
            last_activity_at: Utc::now() - Duration::minutes(120),
            expires_at: Utc::now() - Duration::minutes(60),
        };
        store.insert(&expired).await.unwrap();

        let listed = registry.list_for_display(account).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
        assert!(store.get(expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_slides_expiry_with_current_timeout() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let session = registry.create(account, "agent", 30).await.unwrap();
        assert_eq!(
            (session.expires_at - session.created_at).num_minutes(),
            30
        );

        // Touch with a new, larger timeout: expiry slides forward.
        let touched = registry.touch(session.id, 60).await.unwrap().unwrap();
        assert_eq!(
            (touched.expires_at - touched.last_activity_at).num_minutes(),
            60
        );
        let stored = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, touched.expires_at);
    }

    #[tokio::test]
    async fn touch_removes_expired_sessions() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let expired = Session {
            id: Uuid::new_v4(),
            account_id: account,
            client: "old".to_string(),
            created_at: Utc::now() - Duration::minutes(90),
            last_activity_at: Utc::now() - Duration::minutes(90),
            expires_at: Utc::now() - Duration::minutes(30),
        };
        store.insert(&expired).await.unwrap();

        assert!(registry.touch(expired.id, 30).await.unwrap().is_none());
        assert!(store.get(expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_reports_not_found_for_unknown_or_foreign_ids() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let other_account = Uuid::new_v4();
        let foreign = seed_session(&store, other_account, 5).await;

        assert!(!registry.terminate(account, Uuid::new_v4()).await.unwrap());
        // Belongs to another account: reported as not found, untouched.
        assert!(!registry.terminate(account, foreign.id).await.unwrap());
        assert!(store.get(foreign.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn terminating_one_session_leaves_others_alone() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let a = seed_session(&store, account, 10).await;
        let b = seed_session(&store, account, 5).await;

        assert!(registry.terminate(account, a.id).await.unwrap());

        let untouched = store.get(b.id).await.unwrap().unwrap();
        assert_eq!(untouched.expires_at, b.expires_at);
        assert_eq!(untouched.last_activity_at, b.last_activity_at);
        // Terminated ids stay invalid.
        assert!(!registry.terminate(account, a.id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_lists_prune_the_same_sessions() {
        let (store, registry) = registry();
        let registry = Arc::new(registry);
        let account = Uuid::new_v4();
        for minutes_ago in [50, 40, 30, 20, 10] {
            seed_session(&store, account, minutes_ago).await;
        }

        let (first, second) = tokio::join!(
            registry.list_for_display(account),
            registry.list_for_display(account)
        );
        let first_ids: Vec<Uuid> = first.unwrap().iter().map(|s| s.id).collect();
        let second_ids: Vec<Uuid> = second.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(store.list(account).await.unwrap().len(), MAX_ACTIVE_SESSIONS);
    }

    #[tokio::test]
    async fn concurrent_terminates_of_one_session_succeed_once() {
        let (store, registry) = registry();
        let registry = Arc::new(registry);
        let account = Uuid::new_v4();
        let target = seed_session(&store, account, 5).await;

        let (a, b) = tokio::join!(
            registry.terminate(account, target.id),
            registry.terminate(account, target.id)
        );
        assert_ne!(a.unwrap(), b.unwrap());
        assert!(store.get(target.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_all_except_keeps_the_caller() {
        let (store, registry) = registry();
        let account = Uuid::new_v4();
        let keep = seed_session(&store, account, 1).await;
        for minutes_ago in [10, 20] {
            seed_session(&store, account, minutes_ago).await;
        }

        let removed = registry.terminate_all_except(account, keep.id).await.unwrap();
        assert_eq!(removed, 2);
        let remaining = store.list(account).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }
}
