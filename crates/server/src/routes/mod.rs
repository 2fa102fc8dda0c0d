use axum::{Router, routing::MethodRouter};
use db::{
    derived::ViewContext,
    ownership::{Identity, Owned},
};
use deployment::Deployment;

use crate::{DeploymentImpl, error::ApiError};

pub mod focus;
pub mod goals;
pub mod health;
pub mod labels;
pub mod tasks;

/// Registers `method_router` at `path` with and without a trailing slash.
pub(crate) fn route_both(
    router: Router<DeploymentImpl>,
    path: &str,
    method_router: MethodRouter<DeploymentImpl>,
) -> Router<DeploymentImpl> {
    let trimmed = path.trim_end_matches('/');
    router
        .route(trimmed, method_router.clone())
        .route(&format!("{trimmed}/"), method_router)
}

pub(crate) async fn page_size(deployment: &DeploymentImpl) -> u64 {
    deployment.config().read().await.page_size
}

/// Owner names for `records` plus the live placeholder image.
pub(crate) async fn view_context<T: Owned>(
    deployment: &DeploymentImpl,
    identity: &Identity,
    records: &[T],
) -> Result<ViewContext, ApiError> {
    let placeholder = deployment.config().read().await.default_focus_image.clone();
    Ok(ViewContext::load(&deployment.db().pool, identity, records, &placeholder).await?)
}
