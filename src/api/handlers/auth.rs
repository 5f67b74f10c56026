//! Login endpoint.

use axum::{
    Extension,
    http::{HeaderMap, header::USER_AGENT},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::security::{
    error_response,
    types::{ErrorResponse, LoginRequest, LoginResponse},
};
use crate::security::{LoginOutcome, SecurityService};

fn client_descriptor(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, or two-factor code required", body = LoginResponse),
        (status = 400, description = "Wrong two-factor code", body = ErrorResponse),
        (status = 401, description = "Unknown email or wrong password", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(service): Extension<Arc<SecurityService>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let client = client_descriptor(&headers);
    match service
        .login(
            &request.email,
            &request.password,
            request.two_factor_code.as_deref(),
            &client,
        )
        .await
    {
        Ok(LoginOutcome::Authenticated { token, .. }) => Json(LoginResponse {
            token: Some(token),
            two_factor_required: false,
        })
        .into_response(),
        Ok(LoginOutcome::TwoFactorRequired) => Json(LoginResponse {
            token: None,
            two_factor_required: true,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::client_descriptor;
    use axum::http::{HeaderMap, HeaderValue, header::USER_AGENT};

    #[test]
    fn client_descriptor_falls_back_to_unknown() {
        assert_eq!(client_descriptor(&HeaderMap::new()), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        assert_eq!(client_descriptor(&headers), "Mozilla/5.0");
    }
}
