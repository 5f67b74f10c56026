//! Session inventory endpoints.

use axum::{
    Extension,
    extract::Path,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error_response, require_account,
    types::{Ack, ErrorResponse, SessionItem, SessionListResponse, SessionsTerminatedResponse},
};
use crate::security::SecurityService;

#[utoipa::path(
    get,
    path = "/v1/security/sessions",
    responses(
        (status = 200, description = "Active sessions, most recent activity first", body = SessionListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn list(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.list_sessions(auth).await {
        Ok(sessions) => {
            let sessions = sessions
                .into_iter()
                .map(|session| SessionItem {
                    current: session.id == auth.session_id,
                    id: session.id,
                    client: session.client,
                    created_at: session.created_at,
                    last_activity_at: session.last_activity_at,
                })
                .collect();
            Json(SessionListResponse { sessions }).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/security/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session to terminate")),
    responses(
        (status = 200, description = "Session terminated", body = Ack),
        (status = 400, description = "Refused to terminate the current session", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown or already terminated session", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn terminate(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.terminate_session(auth, session_id).await {
        Ok(()) => Json(Ack {
            message: "Session terminated".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/security/sessions",
    responses(
        (status = 200, description = "All other sessions terminated", body = SessionsTerminatedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn terminate_others(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.terminate_other_sessions(auth).await {
        Ok(terminated) => Json(SessionsTerminatedResponse { terminated }).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/security/sessions/cleanup",
    responses(
        (status = 200, description = "Expired sessions removed", body = SessionsTerminatedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn cleanup(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
) -> Response {
    let auth = match require_account(&headers, &service).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match service.cleanup_expired_sessions(auth).await {
        Ok(terminated) => Json(SessionsTerminatedResponse { terminated }).into_response(),
        Err(err) => error_response(&err),
    }
}
