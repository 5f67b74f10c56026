//! Two-factor enrollment state machine (TOTP).
//!
//! Enrollment is a two-step handshake: `enable` parks a fresh secret in
//! the pending slot, `verify` proves the authenticator was provisioned
//! and promotes it. An account is never protected by a secret the user
//! has not demonstrated possession of.

use std::sync::Arc;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::info;
use uuid::Uuid;

use crate::password;
use crate::security::SecurityError;
use crate::store::CredentialStore;

/// What the client needs to provision an authenticator app.
#[derive(Debug, Clone)]
pub struct EnrollmentMaterial {
    /// Base32-encoded shared secret, for manual entry.
    pub secret: String,
    /// otpauth:// URL, for QR rendering on the client.
    pub otpauth_url: String,
}

/// Point-in-time enrollment state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub pending: bool,
}

pub struct TwoFactorService {
    credentials: Arc<dyn CredentialStore>,
    issuer: String,
}

impl TwoFactorService {
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, issuer: String) -> Self {
        Self { credentials, issuer }
    }

    fn totp(&self, secret_base32: &str, account_label: &str) -> Result<TOTP, SecurityError> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| SecurityError::Internal(anyhow::anyhow!("bad stored secret: {e}")))?;
        TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| SecurityError::Internal(anyhow::anyhow!("TOTP init error: {e}")))
    }

    /// Begin enrollment: generate a fresh secret into the pending slot
    /// and hand back the provisioning material.
    ///
    /// Calling again before verification regenerates the secret; the
    /// previous pending one stops being promotable. Accounts that are
    /// already protected must disable first.
    ///
    /// # Errors
    /// `NotFound` for unknown accounts, `InvalidInput` when two-factor
    /// is already enabled.
    pub async fn enable(&self, account_id: Uuid) -> Result<EnrollmentMaterial, SecurityError> {
        let credential = self
            .credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)?;
        if credential.two_factor.enabled {
            return Err(SecurityError::InvalidInput("two-factor already enabled"));
        }

        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| SecurityError::Internal(anyhow::anyhow!("secret gen error: {e}")))?;
        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            credential.email.clone(),
        )
        .map_err(|e| SecurityError::Internal(anyhow::anyhow!("TOTP init error: {e}")))?;

        let secret_base32 = totp.get_secret_base32();
        self.credentials
            .set_pending_secret(account_id, &secret_base32)
            .await?;
        info!(account_id = %account_id, "Two-factor enrollment started");

        Ok(EnrollmentMaterial {
            otpauth_url: totp.get_url(),
            secret: secret_base32,
        })
    }

    /// Complete enrollment by checking `code` against the pending
    /// secret, then promote it to active.
    ///
    /// # Errors
    /// `NotFound` when no enrollment is pending, `InvalidCode` when the
    /// code does not match.
    pub async fn verify(&self, account_id: Uuid, code: &str) -> Result<(), SecurityError> {
        let credential = self
            .credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)?;
        let Some(pending) = credential.two_factor.pending_secret.as_deref() else {
            return Err(SecurityError::NotFound);
        };

        let totp = self.totp(pending, &credential.email)?;
        if !totp.check_current(code).unwrap_or(false) {
            return Err(SecurityError::InvalidCode);
        }

        if !self.credentials.promote_pending_secret(account_id).await? {
            // Pending slot vanished between the check and the promote.
            return Err(SecurityError::NotFound);
        }
        info!(account_id = %account_id, "Two-factor enabled");
        Ok(())
    }

    /// Disable two-factor after password re-authentication. Clears the
    /// active and any pending secret.
    ///
    /// # Errors
    /// `NotFound` when two-factor is not enabled, `InvalidPassword`
    /// when re-authentication fails.
    pub async fn disable(&self, account_id: Uuid, current_password: &str) -> Result<(), SecurityError> {
        let credential = self
            .credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)?;
        if !credential.two_factor.enabled {
            return Err(SecurityError::NotFound);
        }
        if !password::verify_password(current_password, &credential.password_hash) {
            return Err(SecurityError::InvalidPassword);
        }

        if !self.credentials.clear_two_factor(account_id).await? {
            return Err(SecurityError::NotFound);
        }
        info!(account_id = %account_id, "Two-factor disabled");
        Ok(())
    }

    /// Check a login code against the account's active secret.
    ///
    /// # Errors
    /// `InvalidCode` when the code does not match or no active secret
    /// exists.
    pub async fn check_login_code(&self, account_id: Uuid, code: &str) -> Result<(), SecurityError> {
        let credential = self
            .credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)?;
        let Some(secret) = credential.two_factor.secret.as_deref() else {
            return Err(SecurityError::InvalidCode);
        };

        let totp = self.totp(secret, &credential.email)?;
        if totp.check_current(code).unwrap_or(false) {
            Ok(())
        } else {
            Err(SecurityError::InvalidCode)
        }
    }

    /// # Errors
    /// `NotFound` for unknown accounts.
    pub async fn status(&self, account_id: Uuid) -> Result<TwoFactorStatus, SecurityError> {
        let credential = self
            .credentials
            .load(account_id)
            .await?
            .ok_or(SecurityError::NotFound)?;
        Ok(TwoFactorStatus {
            enabled: credential.two_factor.enabled,
            pending: credential.two_factor.pending_secret.is_some(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{TwoFactorService, TwoFactorStatus};
    use crate::security::SecurityError;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use totp_rs::{Algorithm, Secret, TOTP};
    use uuid::Uuid;

    fn service() -> (Arc<MemoryStore>, TwoFactorService) {
        let store = Arc::new(MemoryStore::new());
        let service = TwoFactorService::new(store.clone(), "TaxFlow".to_string());
        (store, service)
    }

    fn current_code(secret_base32: &str) -> String {
        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap(),
            Some("TaxFlow".to_string()),
            "test@example.com".to_string(),
        )
        .unwrap();
        totp.generate_current().unwrap()
    }

    #[tokio::test]
    async fn enrollment_handshake_enables_two_factor() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;

        let material = service.enable(account).await.unwrap();
        assert!(material.otpauth_url.starts_with("otpauth://totp/"));
        assert!(material.otpauth_url.contains("TaxFlow"));

        // Pending but not yet protecting the account.
        let status = service.status(account).await.unwrap();
        assert_eq!(
            status,
            TwoFactorStatus {
                enabled: false,
                pending: true
            }
        );

        service
            .verify(account, &current_code(&material.secret))
            .await
            .unwrap();
        let status = service.status(account).await.unwrap();
        assert_eq!(
            status,
            TwoFactorStatus {
                enabled: true,
                pending: false
            }
        );
    }

    #[tokio::test]
    async fn wrong_code_leaves_enrollment_pending() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;
        service.enable(account).await.unwrap();

        let err = service.verify(account, "000000").await.unwrap_err();
        assert!(matches!(err, SecurityError::InvalidCode));

        let status = service.status(account).await.unwrap();
        assert!(!status.enabled);
        assert!(status.pending);
    }

    #[tokio::test]
    async fn re_enabling_regenerates_the_pending_secret() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;

        let first = service.enable(account).await.unwrap();
        let second = service.enable(account).await.unwrap();
        assert_ne!(first.secret, second.secret);

        // The superseded secret no longer verifies.
        let err = service
            .verify(account, &current_code(&first.secret))
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidCode));
        service
            .verify(account, &current_code(&second.secret))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enable_refuses_already_protected_accounts() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;
        let material = service.enable(account).await.unwrap();
        service
            .verify(account, &current_code(&material.secret))
            .await
            .unwrap();

        let err = service.enable(account).await.unwrap_err();
        assert!(matches!(err, SecurityError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn verify_without_pending_enrollment_is_not_found() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;
        let err = service.verify(account, "123456").await.unwrap_err();
        assert!(matches!(err, SecurityError::NotFound));
    }

    #[tokio::test]
    async fn disable_requires_the_current_password() {
        let (store, service) = service();
        let hash = crate::password::hash_password("s3cret-pw").unwrap();
        let account = store.create_account("fede@example.com", &hash).await;
        let material = service.enable(account).await.unwrap();
        service
            .verify(account, &current_code(&material.secret))
            .await
            .unwrap();

        let err = service.disable(account, "wrong-pw").await.unwrap_err();
        assert!(matches!(err, SecurityError::InvalidPassword));
        assert!(service.status(account).await.unwrap().enabled);

        service.disable(account, "s3cret-pw").await.unwrap();
        let status = service.status(account).await.unwrap();
        assert!(!status.enabled);
        assert!(!status.pending);

        // Disabling twice reports not found.
        let err = service.disable(account, "s3cret-pw").await.unwrap_err();
        assert!(matches!(err, SecurityError::NotFound));
    }

    #[tokio::test]
    async fn login_code_checks_only_the_active_secret() {
        let (store, service) = service();
        let account = store.create_account("fede@example.com", "hash").await;
        let material = service.enable(account).await.unwrap();

        // Pending secret must not satisfy a login check.
        let err = service
            .check_login_code(account, &current_code(&material.secret))
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidCode));

        service
            .verify(account, &current_code(&material.secret))
            .await
            .unwrap();
        service
            .check_login_code(account, &current_code(&material.secret))
            .await
            .unwrap();
    }
}
