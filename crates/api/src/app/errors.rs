use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::AuthError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn auth_error_body(status: StatusCode, err: &AuthError) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": err.slug(),
            "code": err.code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}

/// Response for a request the authorization middleware refused.
///
/// Every failure is a 4xx: policy denials are 403, everything else 401.
pub fn denial_to_response(err: &AuthError) -> axum::response::Response {
    let status = if err.is_permission_denied() || matches!(err, AuthError::Policy(_)) {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::UNAUTHORIZED
    };
    auth_error_body(status, err)
}

/// Response for a failed session operation (login, refresh).
pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    let status = if err.is_permission_denied() {
        StatusCode::FORBIDDEN
    } else if err.is_client_error() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    auth_error_body(status, err)
}
