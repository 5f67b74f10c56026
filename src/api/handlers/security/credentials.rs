//! Password and session-timeout preference endpoints.

use axum::{
    Extension,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::{
    error_response, require_account,
    types::{Ack, ErrorResponse, PasswordChangeRequest, SessionTimeoutRequest},
};
use crate::security::SecurityService;

#[utoipa::path(
    put,
    path = "/v1/security/credentials",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = Ack),
        (status = 400, description = "New password rejected", body = ErrorResponse),
        (status = 401, description = "Missing token or wrong current password", body = ErrorResponse)
    ),
    tag = "credentials"
)]
pub async fn change_password(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Json(request): Json<PasswordChangeRequest>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service
        .change_password(auth, &request.current_password, &request.new_password)
        .await
    {
        Ok(()) => Json(Ack {
            message: "Password changed".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    put,
    path = "/v1/security/session-timeout",
    request_body = SessionTimeoutRequest,
    responses(
        (status = 200, description = "Session timeout updated", body = Ack),
        (status = 400, description = "Timeout outside the accepted range", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "credentials"
)]
pub async fn update_session_timeout(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Json(request): Json<SessionTimeoutRequest>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.update_session_timeout(auth, request.minutes).await {
        Ok(()) => Json(Ack {
            message: "Session timeout updated".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}
