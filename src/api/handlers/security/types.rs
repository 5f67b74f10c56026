//! Request/response types for security endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Ack {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Required when two-factor is enabled on the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    /// Present on full authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// `true` means retry with `two_factor_code`; no session exists yet.
    pub two_factor_required: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorEnableResponse {
    /// Base32 secret for manual authenticator entry.
    pub secret: String,
    /// otpauth:// URL for QR provisioning.
    pub otpauth_url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorVerifyRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorDisableRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorStatusResponse {
    pub enabled: bool,
    pub pending: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionItem {
    pub id: Uuid,
    pub client: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Marks the session the request arrived on.
    pub current: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionItem>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionsTerminatedResponse {
    pub terminated: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionTimeoutRequest {
    pub minutes: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn login_request_code_is_optional() -> Result<()> {
        let decoded: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw"}"#)?;
        assert!(decoded.two_factor_code.is_none());
        Ok(())
    }

    #[test]
    fn login_response_omits_absent_token() -> Result<()> {
        let value = serde_json::to_value(LoginResponse {
            token: None,
            two_factor_required: true,
        })?;
        assert!(value.get("token").is_none());
        Ok(())
    }

    #[test]
    fn session_item_round_trips() -> Result<()> {
        let item = SessionItem {
            id: Uuid::new_v4(),
            client: "Mozilla/5.0".to_string(),
            created_at: chrono::Utc::now(),
            last_activity_at: chrono::Utc::now(),
            current: true,
        };
        let value = serde_json::to_value(&item)?;
        let decoded: SessionItem = serde_json::from_value(value)?;
        assert_eq!(decoded.id, item.id);
        assert!(decoded.current);
        Ok(())
    }
}
