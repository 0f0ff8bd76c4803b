use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use warden_auth::{AuthError, AuthzRequest, Decision, TENANT_OVERRIDE_HEADER};

use crate::app::AppContext;
use crate::app::errors::denial_to_response;
use crate::context::{PrincipalContext, TenantContext};

/// Authorize every request against the policy engine before it reaches a
/// handler. Allowed requests carry [`TenantContext`] and [`PrincipalContext`]
/// extensions; denied requests never reach the router.
pub async fn authz_middleware(
    State(ctx): State<Arc<AppContext>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let authorization = header_value(req.headers(), header::AUTHORIZATION.as_str());
    let tenant_override = header_value(req.headers(), TENANT_OVERRIDE_HEADER);

    let decision = ctx
        .authorizer
        .authorize(AuthzRequest {
            method: &method,
            path: &path,
            authorization: authorization.as_deref(),
            tenant_override: tenant_override.as_deref(),
        })
        .await;

    match decision {
        Ok(Decision::Public) => next.run(req).await,
        Ok(Decision::Allowed(principal)) => {
            req.extensions_mut().insert(TenantContext::new(
                principal.tenant_id,
                principal.domain.clone(),
            ));
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        Err(err) => {
            match &err {
                AuthError::Unauthorized(_) | AuthError::UserNotFound => {
                    tracing::warn!(%method, %path, code = err.code(), error = %err, "request denied")
                }
                _ => tracing::error!(%method, %path, code = err.code(), error = %err, "request denied"),
            }
            denial_to_response(&err)
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
