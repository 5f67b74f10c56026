//! The facade every caller goes through.

use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{SecurityConfig, SecurityError, config::MAX_SESSION_TIMEOUT_MINUTES};
use crate::password;
use crate::session::SessionRegistry;
use crate::store::{AccountCredential, CredentialStore, Session, SessionStore};
use crate::token::TokenIssuer;
use crate::twofactor::{EnrollmentMaterial, TwoFactorService, TwoFactorStatus};

const MIN_PASSWORD_LENGTH: usize = 8;

// Verified against when the email is unknown, so both rejection paths
// cost one Argon2 verification.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

/// Proof of an authenticated request, shared by every protected
/// operation.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub session_id: Uuid,
}

/// Result of a credential check at login.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Password (and code, when required) accepted; a session exists
    /// and the token is bound to it.
    Authenticated { token: String, session: Session },
    /// Password accepted but the account is protected: the caller must
    /// retry with a two-factor code. No session was created.
    TwoFactorRequired,
}

/// Single entry point for authentication, sessions, two-factor, and
/// credential changes.
pub struct SecurityService {
    config: SecurityConfig,
    credentials: Arc<dyn CredentialStore>,
    sessions: SessionRegistry,
    two_factor: TwoFactorService,
    issuer: TokenIssuer,
}

impl SecurityService {
    pub fn new<S>(config: SecurityConfig, store: Arc<S>, token_secret: SecretString) -> Self
    where
        S: CredentialStore + SessionStore + 'static,
    {
        let credentials: Arc<dyn CredentialStore> = store.clone();
        let sessions = SessionRegistry::new(store);
        let two_factor = TwoFactorService::new(credentials.clone(), config.totp_issuer.clone());
        Self {
            config,
            credentials,
            sessions,
            two_factor,
            issuer: TokenIssuer::new(token_secret),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    async fn load_credential(&self, account_id: Uuid) -> Result<AccountCredential, SecurityError> {
        self.credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)
    }

    fn timeout_of(&self, credential: &AccountCredential) -> i64 {
        if credential.session_timeout_minutes > 0 {
            credential.session_timeout_minutes
        } else {
            self.config.default_session_timeout_minutes
        }
    }

    /// Authenticate with email and password, plus a two-factor code for
    /// protected accounts. On success a session is created and a token
    /// bound to it is returned.
    ///
    /// # Errors
    /// `InvalidPassword` for unknown emails and wrong passwords alike,
    /// `InvalidCode` when the code is missing or wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
        client: &str,
    ) -> Result<LoginOutcome, SecurityError> {
        let email = email.trim().to_lowercase();
        let Some(credential) = self.credentials.lookup_by_email(&email).await? else {
            let _ = password::verify_password(password, DUMMY_HASH);
            return Err(SecurityError::InvalidPassword);
        };
        if !password::verify_password(password, &credential.password_hash) {
            warn!(account_id = %credential.account_id, "Login rejected: bad password");
            return Err(SecurityError::InvalidPassword);
        }

        if credential.two_factor.enabled {
            let Some(code) = two_factor_code else {
                return Ok(LoginOutcome::TwoFactorRequired);
            };
            self.two_factor
                .check_login_code(credential.account_id, code)
                .await?;
        }

        let session = self
            .sessions
            .create(credential.account_id, client, self.timeout_of(&credential))
            .await?;
        let token = self
            .issuer
            .issue(credential.account_id, session.id, session.expires_at)
            .map_err(|e| SecurityError::Internal(e.into()))?;
        info!(account_id = %credential.account_id, session_id = %session.id, "Login succeeded");
        Ok(LoginOutcome::Authenticated { token, session })
    }

    /// Resolve a bearer token into an [`AuthContext`], refreshing the
    /// backing session's activity and sliding its expiry.
    ///
    /// A valid signature is not enough: the session named by the token
    /// must still be alive, so terminated devices lose access even
    /// before their tokens expire.
    ///
    /// # Errors
    /// `Unauthorized` for any failure.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, SecurityError> {
        let claims = self
            .issuer
            .verify(token)
            .map_err(|_| SecurityError::Unauthorized)?;
        let credential = self
            .credentials
            .load(claims.sub)
            .await?
            .ok_or(SecurityError::Unauthorized)?;
        let session = self
            .sessions
            .touch(claims.sid, self.timeout_of(&credential))
            .await?
            .ok_or(SecurityError::Unauthorized)?;
        if session.account_id != claims.sub {
            return Err(SecurityError::Unauthorized);
        }
        Ok(AuthContext {
            account_id: claims.sub,
            session_id: session.id,
        })
    }

    /// Change the account password after re-authentication.
    ///
    /// Existing sessions stay alive; only the credential changes.
    ///
    /// # Errors
    /// `InvalidPassword` when re-authentication fails, `InvalidInput`
    /// when the new password is too short.
    pub async fn change_password(
        &self,
        auth: AuthContext,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), SecurityError> {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(SecurityError::InvalidInput(
                "password must be at least 8 characters",
            ));
        }
        let credential = self.load_credential(auth.account_id).await?;
        if !password::verify_password(current_password, &credential.password_hash) {
            return Err(SecurityError::InvalidPassword);
        }

        let hash = password::hash_password(new_password).map_err(SecurityError::Internal)?;
        if !self
            .credentials
            .update_password_hash(auth.account_id, &hash)
            .await?
        {
            return Err(SecurityError::NotFound);
        }
        info!(account_id = %auth.account_id, "Password changed");
        Ok(())
    }

    /// Begin two-factor enrollment.
    ///
    /// # Errors
    /// See [`TwoFactorService::enable`].
    pub async fn two_factor_enable(
        &self,
        auth: AuthContext,
    ) -> Result<EnrollmentMaterial, SecurityError> {
        self.two_factor.enable(auth.account_id).await
    }

    /// Complete two-factor enrollment with a code from the
    /// authenticator app.
    ///
    /// # Errors
    /// `InvalidInput` for codes that are not six digits; otherwise see
    /// [`TwoFactorService::verify`].
    pub async fn two_factor_verify(
        &self,
        auth: AuthContext,
        code: &str,
    ) -> Result<(), SecurityError> {
        validate_code_shape(code)?;
        self.two_factor.verify(auth.account_id, code).await
    }

    /// Disable two-factor after password re-authentication.
    ///
    /// # Errors
    /// `InvalidInput` when no password was supplied; otherwise see
    /// [`TwoFactorService::disable`].
    pub async fn two_factor_disable(
        &self,
        auth: AuthContext,
        current_password: &str,
    ) -> Result<(), SecurityError> {
        if current_password.is_empty() {
            return Err(SecurityError::InvalidInput("password is required"));
        }
        self.two_factor.disable(auth.account_id, current_password).await
    }

    /// # Errors
    /// `NotFound` for unknown accounts.
    pub async fn two_factor_status(
        &self,
        auth: AuthContext,
    ) -> Result<TwoFactorStatus, SecurityError> {
        self.two_factor.status(auth.account_id).await
    }

    /// Active sessions, most recent activity first. Expired sessions
    /// are swept and the active ceiling enforced as part of the read.
    ///
    /// # Errors
    /// Propagates storage failures as `Transient`.
    pub async fn list_sessions(&self, auth: AuthContext) -> Result<Vec<Session>, SecurityError> {
        Ok(self.sessions.list_for_display(auth.account_id).await?)
    }

    /// Terminate one session by id.
    ///
    /// # Errors
    /// `InvalidInput` when targeting the caller's own session (log out
    /// instead), `NotFound` for ids that are unknown, already gone, or
    /// owned by someone else.
    pub async fn terminate_session(
        &self,
        auth: AuthContext,
        session_id: Uuid,
    ) -> Result<(), SecurityError> {
        if session_id == auth.session_id {
            return Err(SecurityError::InvalidInput(
                "cannot terminate the current session",
            ));
        }
        if !self.sessions.terminate(auth.account_id, session_id).await? {
            return Err(SecurityError::NotFound);
        }
        info!(account_id = %auth.account_id, session_id = %session_id, "Session terminated");
        Ok(())
    }

    /// Terminate every session except the caller's. Returns the number
    /// terminated.
    ///
    /// # Errors
    /// Propagates storage failures as `Transient`.
    pub async fn terminate_other_sessions(&self, auth: AuthContext) -> Result<u64, SecurityError> {
        let terminated = self
            .sessions
            .terminate_all_except(auth.account_id, auth.session_id)
            .await?;
        info!(account_id = %auth.account_id, terminated, "Terminated other sessions");
        Ok(terminated)
    }

    /// Sweep the caller's expired sessions. Returns the number removed.
    ///
    /// # Errors
    /// Propagates storage failures as `Transient`.
    pub async fn cleanup_expired_sessions(&self, auth: AuthContext) -> Result<u64, SecurityError> {
        Ok(self.sessions.terminate_expired(auth.account_id).await?)
    }

    /// Update the account's session timeout preference. Applies to
    /// future session creation and activity refreshes only; existing
    /// `expires_at` values are not rewritten.
    ///
    /// # Errors
    /// `InvalidInput` when `minutes` is outside `1..=525600`.
    pub async fn update_session_timeout(
        &self,
        auth: AuthContext,
        minutes: i64,
    ) -> Result<(), SecurityError> {
        if !(1..=MAX_SESSION_TIMEOUT_MINUTES).contains(&minutes) {
            return Err(SecurityError::InvalidInput(
                "session timeout must be between 1 and 525600 minutes",
            ));
        }
        if !self
            .credentials
            .update_session_timeout(auth.account_id, minutes)
            .await?
        {
            return Err(SecurityError::NotFound);
        }
        Ok(())
    }
}

fn validate_code_shape(code: &str) -> Result<(), SecurityError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(SecurityError::InvalidInput(
            "two-factor code must be 6 digits",
        ))
    }
}
