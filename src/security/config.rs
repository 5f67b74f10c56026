use crate::store::DEFAULT_SESSION_TIMEOUT_MINUTES;

/// Upper bound on the per-account session timeout (one year).
pub const MAX_SESSION_TIMEOUT_MINUTES: i64 = 525_600;

/// Tunables for the security facade.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Issuer label embedded in otpauth enrollment URLs.
    pub totp_issuer: String,
    /// Timeout applied to accounts with no stored preference, minutes.
    pub default_session_timeout_minutes: i64,
    /// Browser origin allowed to call the API.
    pub frontend_url: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            totp_issuer: "TaxFlow".to_string(),
            default_session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: &str) -> Self {
        self.totp_issuer = issuer.to_string();
        self
    }

    #[must_use]
    pub fn with_default_session_timeout_minutes(mut self, minutes: i64) -> Self {
        self.default_session_timeout_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_frontend_url(mut self, url: &str) -> Self {
        self.frontend_url = url.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::SecurityConfig;

    #[test]
    fn builder_overrides_defaults() {
        let config = SecurityConfig::new()
            .with_totp_issuer("TaxFlow Staging")
            .with_default_session_timeout_minutes(60)
            .with_frontend_url("https://app.taxflow.it");
        assert_eq!(config.totp_issuer, "TaxFlow Staging");
        assert_eq!(config.default_session_timeout_minutes, 60);
        assert_eq!(config.frontend_url, "https://app.taxflow.it");
    }
}
