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
    derived::TaskView,
    filters::TaskFilters,
    models::task::{CreateTask, Task, TaskLinks, UpdateTask},
    ownership::Identity,
};
use deployment::Deployment;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::ApiJson,
    middleware::load_task_middleware,
    pagination::{Page, page_request},
    routes::{page_size, route_both, view_context},
};

/// Accepts `active`, `today`, `achieved`, `focus` and `goal`.
pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<ResponseJson<Page<TaskView>>, ApiError> {
    let pool = &deployment.db().pool;
    let filters = TaskFilters::from_query(&query)?;
    let request = page_request(&query, page_size(&deployment).await)?;
    let paged = Task::find_for_owner(pool, &identity, &filters, request).await?;

    let links = TaskLinks::load(pool, &paged.items).await?;
    let ctx = view_context(&deployment, &identity, &paged.items).await?;
    let paged = paged.map(|task| TaskView::build(task, &links, &ctx));
    Ok(ResponseJson(Page::build(paged, request, &uri)?))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<CreateTask>,
) -> Result<(StatusCode, ResponseJson<TaskView>), ApiError> {
    let task = Task::create(&deployment.db().pool, &identity, &payload).await?;
    tracing::info!(
        task_id = task.id,
        user_id = identity.user_id,
        labels = task.labels.len(),
        "Task created"
    );
    let view = render(&deployment, &identity, task).await?;
    Ok((StatusCode::CREATED, ResponseJson(view)))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<TaskView>, ApiError> {
    Ok(ResponseJson(render(&deployment, &identity, task).await?))
}

pub async fn replace_task(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Task>,
    ApiJson(payload): ApiJson<UpdateTask>,
) -> Result<ResponseJson<TaskView>, ApiError> {
    let task = Task::update(&deployment.db().pool, existing.id, &payload, false).await?;
    Ok(ResponseJson(render(&deployment, &identity, task).await?))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Task>,
    ApiJson(payload): ApiJson<UpdateTask>,
) -> Result<ResponseJson<TaskView>, ApiError> {
    let task = Task::update(&deployment.db().pool, existing.id, &payload, true).await?;
    Ok(ResponseJson(render(&deployment, &identity, task).await?))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(task): Extension<Task>,
) -> Result<StatusCode, ApiError> {
    Task::delete(&deployment.db().pool, task.id).await?;
    tracing::info!(task_id = task.id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn render(
    deployment: &DeploymentImpl,
    identity: &Identity,
    task: Task,
) -> Result<TaskView, ApiError> {
    let tasks = std::slice::from_ref(&task);
    let links = TaskLinks::load(&deployment.db().pool, tasks).await?;
    let ctx = view_context(deployment, identity, tasks).await?;
    Ok(TaskView::build(task, &links, &ctx))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let item = route_both(
        Router::new(),
        "/tasks/{task_id}",
        get(get_task)
            .put(replace_task)
            .patch(update_task)
            .delete(delete_task),
    )
    .route_layer(from_fn_with_state(
        deployment.clone(),
        load_task_middleware::<DeploymentImpl>,
    ));

    route_both(Router::new(), "/tasks", get(get_tasks).post(create_task)).merge(item)
}
