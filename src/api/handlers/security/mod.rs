//! Token-protected security endpoints.

pub mod credentials;
pub mod sessions;
pub mod two_factor;
pub mod types;

use axum::{
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::security::{AuthContext, SecurityError, SecurityService};
use types::ErrorResponse;

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer token into an [`AuthContext`], or return the 401
/// response to bubble up. Touches the backing session.
pub async fn require_account(
    headers: &HeaderMap,
    service: &Arc<SecurityService>,
) -> Result<AuthContext, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(error_response(&SecurityError::Unauthorized));
    };
    service
        .authenticate(&token)
        .await
        .map_err(|err| error_response(&err))
}

/// Map a [`SecurityError`] onto a status code and JSON body.
pub fn error_response(err: &SecurityError) -> Response {
    let status = match err {
        SecurityError::Unauthorized | SecurityError::InvalidPassword => StatusCode::UNAUTHORIZED,
        SecurityError::InvalidCode | SecurityError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SecurityError::NotFound => StatusCode::NOT_FOUND,
        SecurityError::Transient(source) => {
            error!("Storage unavailable: {source:?}");
            StatusCode::SERVICE_UNAVAILABLE
        }
        SecurityError::Internal(source) => {
            error!("Internal error: {source:?}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_extraction_accepts_both_cases() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc")).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_bearer_token(&headers_with("bearer abc")).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn bearer_extraction_rejects_missing_or_empty() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
        assert!(extract_bearer_token(&headers_with("Bearer ")).is_none());
        assert!(extract_bearer_token(&headers_with("Basic abc")).is_none());
    }
}
