use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::models::user::User;
use deployment::Deployment;

use crate::{DeploymentImpl, error::ApiError};

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_request_token(req: &Request) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // 2) X-API-Token: <token>
    req.headers()
        .get("x-api-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolves the bearer token to an [`db::ownership::Identity`] request
/// extension. Requests without a known token stop here with a 403.
pub async fn require_identity(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let presented = extract_request_token(&req);
    let user = match presented.as_deref() {
        Some(token) => match User::find_by_token(&deployment.db().pool, token).await {
            Ok(user) => user,
            Err(err) => return ApiError::from(err).into_response(),
        },
        None => None,
    };

    let Some(user) = user else {
        let reason = if presented.is_none() {
            "missing_token"
        } else {
            "unknown_token"
        };
        tracing::warn!(
            path = %req.uri().path(),
            method = %req.method(),
            reason,
            "Unauthenticated API request"
        );
        return ApiError::NotAuthenticated.into_response();
    };

    req.extensions_mut().insert(user.identity());
    next.run(req).await
}
