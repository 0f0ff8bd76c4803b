//! HTTP API: session endpoints and the authorization middleware in front of
//! every protected route.

pub mod app;
pub mod context;
pub mod middleware;
