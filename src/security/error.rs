use thiserror::Error;

/// Failure taxonomy for the security facade.
///
/// Variants are deliberately coarse: callers (and the HTTP layer) react
/// to the category, not to the underlying cause. `InvalidPassword` is
/// returned for unknown accounts too, so login failures never reveal
/// whether an email is registered.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Missing, malformed, expired, or revoked token.
    #[error("unauthorized")]
    Unauthorized,

    /// Password re-authentication failed.
    #[error("invalid password")]
    InvalidPassword,

    /// Two-factor code did not match.
    #[error("invalid two-factor code")]
    InvalidCode,

    /// The targeted record or state does not exist.
    #[error("not found")]
    NotFound,

    /// The request itself is unacceptable.
    #[error("{0}")]
    InvalidInput(&'static str),

    /// Storage or another backing service is unavailable; retryable.
    #[error("service temporarily unavailable")]
    Transient(#[source] anyhow::Error),

    /// Unexpected internal failure.
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<crate::store::StoreError> for SecurityError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::Transient(err.0)
    }
}
