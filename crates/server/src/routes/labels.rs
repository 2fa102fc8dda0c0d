use std::collections::HashMap;

use axum::{
    Extension, Router,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::{
    derived::LabelView,
    models::label::{CreateLabel, Label, UpdateLabel},
    ownership::Identity,
};
use deployment::Deployment;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::ApiJson,
    middleware::load_label_middleware,
    pagination::{Page, page_request},
    routes::{page_size, route_both, view_context},
};

pub async fn get_labels(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<ResponseJson<Page<LabelView>>, ApiError> {
    let request = page_request(&query, page_size(&deployment).await)?;
    let paged = Label::find_for_owner(&deployment.db().pool, &identity, request).await?;
    let ctx = view_context(&deployment, &identity, &paged.items).await?;
    let paged = paged.map(|label| LabelView::build(label, &ctx));
    Ok(ResponseJson(Page::build(paged, request, &uri)?))
}

pub async fn create_label(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<CreateLabel>,
) -> Result<(StatusCode, ResponseJson<LabelView>), ApiError> {
    let label = Label::create(&deployment.db().pool, &identity, &payload).await?;
    tracing::info!(label_id = label.id, user_id = identity.user_id, "Label created");
    let view = render(&deployment, &identity, label).await?;
    Ok((StatusCode::CREATED, ResponseJson(view)))
}

pub async fn get_label(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(label): Extension<Label>,
) -> Result<ResponseJson<LabelView>, ApiError> {
    Ok(ResponseJson(render(&deployment, &identity, label).await?))
}

pub async fn replace_label(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Label>,
    ApiJson(payload): ApiJson<UpdateLabel>,
) -> Result<ResponseJson<LabelView>, ApiError> {
    let label = Label::update(&deployment.db().pool, existing.id, &payload, false).await?;
    Ok(ResponseJson(render(&deployment, &identity, label).await?))
}

pub async fn update_label(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Label>,
    ApiJson(payload): ApiJson<UpdateLabel>,
) -> Result<ResponseJson<LabelView>, ApiError> {
    let label = Label::update(&deployment.db().pool, existing.id, &payload, true).await?;
    Ok(ResponseJson(render(&deployment, &identity, label).await?))
}

pub async fn delete_label(
    State(deployment): State<DeploymentImpl>,
    Extension(label): Extension<Label>,
) -> Result<StatusCode, ApiError> {
    Label::delete(&deployment.db().pool, label.id).await?;
    tracing::info!(label_id = label.id, "Label deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn render(
    deployment: &DeploymentImpl,
    identity: &Identity,
    label: Label,
) -> Result<LabelView, ApiError> {
    let ctx = view_context(deployment, identity, std::slice::from_ref(&label)).await?;
    Ok(LabelView::build(label, &ctx))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let item = route_both(
        Router::new(),
        "/labels/{label_id}",
        get(get_label)
            .put(replace_label)
            .patch(update_label)
            .delete(delete_label),
    )
    .route_layer(from_fn_with_state(
        deployment.clone(),
        load_label_middleware::<DeploymentImpl>,
    ));

    route_both(Router::new(), "/labels", get(get_labels).post(create_label)).merge(item)
}
