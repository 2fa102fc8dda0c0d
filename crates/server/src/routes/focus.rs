use std::collections::HashMap;

use axum::{
    Extension, Router,
    extract::{
        DefaultBodyLimit, Multipart, OriginalUri, Query, State, multipart::MultipartRejection,
    },
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    derived::FocusView,
    models::focus::{CreateFocus, Focus, UpdateFocus},
    ownership::Identity,
    validation::ValidationErrors,
};
use deployment::Deployment;
use services::services::config::MAX_IMAGE_BYTES_CEILING;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::ApiJson,
    middleware::load_focus_middleware,
    pagination::{Page, page_request},
    routes::{page_size, route_both, view_context},
};

const IMAGE_FIELD: &str = "image";
const NO_FILE: &str = "No file was submitted.";
const EMPTY_FILE: &str = "The submitted file is empty.";
/// Room for multipart boundaries and part headers on top of the image.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;
const UPLOAD_BODY_LIMIT: u64 = MAX_IMAGE_BYTES_CEILING + MULTIPART_OVERHEAD;

pub async fn get_focus_areas(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<ResponseJson<Page<FocusView>>, ApiError> {
    let request = page_request(&query, page_size(&deployment).await)?;
    let paged = Focus::find_for_owner(&deployment.db().pool, &identity, request).await?;
    let ctx = view_context(&deployment, &identity, &paged.items).await?;
    let paged = paged.map(|focus| FocusView::build(focus, &ctx));
    Ok(ResponseJson(Page::build(paged, request, &uri)?))
}

pub async fn create_focus(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<CreateFocus>,
) -> Result<(StatusCode, ResponseJson<FocusView>), ApiError> {
    let focus = Focus::create(&deployment.db().pool, &identity, &payload).await?;
    tracing::info!(focus_id = focus.id, user_id = identity.user_id, "Focus created");
    let view = render(&deployment, &identity, focus).await?;
    Ok((StatusCode::CREATED, ResponseJson(view)))
}

pub async fn get_focus(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(focus): Extension<Focus>,
) -> Result<ResponseJson<FocusView>, ApiError> {
    Ok(ResponseJson(render(&deployment, &identity, focus).await?))
}

pub async fn replace_focus(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Focus>,
    ApiJson(payload): ApiJson<UpdateFocus>,
) -> Result<ResponseJson<FocusView>, ApiError> {
    save(&deployment, &identity, existing, &payload, false).await
}

pub async fn update_focus(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Focus>,
    ApiJson(payload): ApiJson<UpdateFocus>,
) -> Result<ResponseJson<FocusView>, ApiError> {
    save(&deployment, &identity, existing, &payload, true).await
}

pub async fn delete_focus(
    State(deployment): State<DeploymentImpl>,
    Extension(focus): Extension<Focus>,
) -> Result<StatusCode, ApiError> {
    Focus::delete(&deployment.db().pool, focus.id).await?;
    tracing::info!(focus_id = focus.id, "Focus deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the focus image with the `image` part of a multipart body.
pub async fn upload_focus_image(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(focus): Extension<Focus>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ResponseJson<FocusView>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            data = Some(field.bytes().await?);
            break;
        }
    }
    let data = match data {
        None => return Err(ValidationErrors::single(IMAGE_FIELD, NO_FILE).into()),
        Some(data) if data.is_empty() => {
            return Err(ValidationErrors::single(IMAGE_FIELD, EMPTY_FILE).into());
        }
        Some(data) => data,
    };

    let url = deployment.image().store(&data).await?;
    let focus = Focus::set_image(&deployment.db().pool, focus.id, &url).await?;
    tracing::info!(focus_id = focus.id, image = %url, "Focus image updated");
    Ok(ResponseJson(render(&deployment, &identity, focus).await?))
}

async fn save(
    deployment: &DeploymentImpl,
    identity: &Identity,
    existing: Focus,
    payload: &UpdateFocus,
    partial: bool,
) -> Result<ResponseJson<FocusView>, ApiError> {
    let focus = Focus::update(&deployment.db().pool, existing.id, payload, partial).await?;
    Ok(ResponseJson(render(deployment, identity, focus).await?))
}

async fn render(
    deployment: &DeploymentImpl,
    identity: &Identity,
    focus: Focus,
) -> Result<FocusView, ApiError> {
    let ctx = view_context(deployment, identity, std::slice::from_ref(&focus)).await?;
    Ok(FocusView::build(focus, &ctx))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let item = route_both(
        Router::new(),
        "/focus/{focus_id}",
        get(get_focus)
            .put(replace_focus)
            .patch(update_focus)
            .delete(delete_focus),
    );
    let item = route_both(
        item,
        "/focus/{focus_id}/image",
        post(upload_focus_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT as usize)),
    )
    .route_layer(from_fn_with_state(
        deployment.clone(),
        load_focus_middleware::<DeploymentImpl>,
    ));

    route_both(Router::new(), "/focus", get(get_focus_areas).post(create_focus)).merge(item)
}
