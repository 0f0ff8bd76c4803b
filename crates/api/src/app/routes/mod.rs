use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod system;

/// Routes behind the authorization middleware.
pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/codes", get(auth::codes))
        .route("/whoami", get(system::whoami))
}
