//! Session endpoints: login, refresh-token rotation, logout, access codes.
//!
//! The refresh token travels both in the JSON body and in the `jwt` cookie;
//! the body wins when both are present.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use warden_auth::session::{TokenPair, UserInfo};

use crate::app::AppContext;
use crate::app::errors::{auth_error_to_response, json_error};
use crate::context::PrincipalContext;

pub const REFRESH_COOKIE: &str = "jwt";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_info: UserInfo,
}

pub async fn login(
    Extension(ctx): Extension<Arc<AppContext>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Response {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "username and password are required",
        );
    }

    match ctx.sessions.login(req.username.trim(), &req.password).await {
        Ok(outcome) => {
            let cookie = refresh_cookie(outcome.tokens.refresh_token.clone(), refresh_max_age(&ctx));
            (
                jar.add(cookie),
                Json(LoginResponse {
                    tokens: outcome.tokens,
                    user_info: outcome.user,
                }),
            )
                .into_response()
        }
        Err(e) => auth_error_to_response(&e),
    }
}

pub async fn refresh(
    Extension(ctx): Extension<Arc<AppContext>>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let token = refresh_token_from(&jar, &body);

    match ctx.sessions.refresh(&token).await {
        Ok(tokens) => {
            let cookie = refresh_cookie(tokens.refresh_token.clone(), refresh_max_age(&ctx));
            (jar.add(cookie), Json(tokens)).into_response()
        }
        Err(e) => auth_error_to_response(&e),
    }
}

pub async fn logout(
    Extension(ctx): Extension<Arc<AppContext>>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let token = refresh_token_from(&jar, &body);
    ctx.sessions.logout(&token);

    (
        jar.add(refresh_cookie(String::new(), 0)),
        Json(serde_json::json!({})),
    )
        .into_response()
}

pub async fn codes(
    Extension(ctx): Extension<Arc<AppContext>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let codes = ctx.sessions.access_codes(principal.principal()).await;
    Json(serde_json::json!({ "codes": codes }))
}

fn refresh_max_age(ctx: &AppContext) -> i64 {
    ctx.tokens.ttl().refresh.num_seconds()
}

fn refresh_cookie(value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Body field `refreshToken` if present and non-blank, else the `jwt` cookie.
fn refresh_token_from(jar: &CookieJar, body: &[u8]) -> String {
    let from_body = serde_json::from_slice::<RefreshTokenRequest>(body)
        .ok()
        .map(|r| r.refresh_token.trim().to_string())
        .filter(|t| !t.is_empty());

    from_body
        .or_else(|| {
            jar.get(REFRESH_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_default()
}
