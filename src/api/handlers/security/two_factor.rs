//! Two-factor enrollment endpoints.

use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::{
    error_response, require_account,
    types::{
        Ack, ErrorResponse, TwoFactorDisableRequest, TwoFactorEnableResponse,
        TwoFactorStatusResponse, TwoFactorVerifyRequest,
    },
};
use crate::security::SecurityService;

#[utoipa::path(
    post,
    path = "/v1/security/2fa/enable",
    responses(
        (status = 200, description = "Enrollment started, provisioning material returned", body = TwoFactorEnableResponse),
        (status = 400, description = "Two-factor already enabled", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "2fa"
)]
pub async fn enable(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.two_factor_enable(auth).await {
        Ok(material) => Json(TwoFactorEnableResponse {
            secret: material.secret,
            otpauth_url: material.otpauth_url,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/security/2fa/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Code accepted, two-factor now enabled", body = Ack),
        (status = 400, description = "Malformed or wrong code", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No enrollment in progress", body = ErrorResponse)
    ),
    tag = "2fa"
)]
pub async fn verify(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Json(request): Json<TwoFactorVerifyRequest>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.two_factor_verify(auth, &request.code).await {
        Ok(()) => Json(Ack {
            message: "Two-factor authentication enabled".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/security/2fa/disable",
    request_body = TwoFactorDisableRequest,
    responses(
        (status = 200, description = "Two-factor disabled", body = Ack),
        (status = 400, description = "No password supplied", body = ErrorResponse),
        (status = 401, description = "Missing token or wrong password", body = ErrorResponse),
        (status = 404, description = "Two-factor not enabled", body = ErrorResponse)
    ),
    tag = "2fa"
)]
pub async fn disable(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Json(request): Json<TwoFactorDisableRequest>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.two_factor_disable(auth, &request.password).await {
        Ok(()) => Json(Ack {
            message: "Two-factor authentication disabled".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/security/2fa/status",
    responses(
        (status = 200, description = "Current enrollment state", body = TwoFactorStatusResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "2fa"
)]
pub async fn status(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.two_factor_status(auth).await {
        Ok(status) => (
            StatusCode::OK,
            Json(TwoFactorStatusResponse {
                enabled: status.enabled,
                pending: status.pending,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}
