//! HTTP API application wiring (Axum router + shared context).
//!
//! - `state.rs`: the [`AppContext`] every handler and the middleware share
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod state;

pub use state::AppContext;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(ctx: Arc<AppContext>) -> Router {
    // Everything except the health check passes the authorization middleware;
    // login and refresh are allow-listed inside it.
    let guarded = routes::router()
        .layer(Extension(ctx.clone()))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            ctx,
            middleware::authz_middleware,
        )));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(guarded)
}
