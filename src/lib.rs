//! # TaxFlow Account Security Service
//!
//! `taxflow-account` is the account security backend for the TaxFlow
//! dashboard. It owns password-authenticated session issuance, the
//! two-factor (TOTP) enrollment lifecycle, and the active-session
//! inventory with its pruning and expiry policies.
//!
//! ## Sessions
//!
//! Every successful login creates a session record and a signed bearer
//! token bound to that session's expiry. Session expiry is sliding:
//! each authenticated call refreshes `last_activity_at` and recomputes
//! `expires_at` from the account's current timeout preference.
//!
//! **Note:** listing sessions is not a pure read. Whenever the session
//! list is fetched for display, sessions beyond the active ceiling of
//! three are terminated oldest-first before the list is returned. There
//! is no background sweeper; pruning and expiry are evaluated lazily at
//! read/write time.
//!
//! ## Two-factor authentication
//!
//! Enrollment keeps the unconfirmed secret in a separate `pending`
//! slot. Only a successful code verification promotes it to the active
//! secret; disabling always re-verifies the account password so a
//! hijacked session cannot silently strip the second factor.

pub mod api;
pub mod cli;
pub mod password;
pub mod security;
pub mod session;
pub mod store;
pub mod token;
pub mod twofactor;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
