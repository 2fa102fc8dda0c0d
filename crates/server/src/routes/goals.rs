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
    derived::GoalView,
    filters::GoalFilters,
    models::goal::{CreateGoal, Goal, UpdateGoal},
    ownership::Identity,
};
use deployment::Deployment;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::ApiJson,
    middleware::load_goal_middleware,
    pagination::{Page, page_request},
    routes::{page_size, route_both, view_context},
};

/// Accepts `parent_id`, `parent=None` and `focus_id`.
pub async fn get_goals(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<ResponseJson<Page<GoalView>>, ApiError> {
    let filters = GoalFilters::from_query(&query)?;
    let request = page_request(&query, page_size(&deployment).await)?;
    let paged = Goal::find_for_owner(&deployment.db().pool, &identity, &filters, request).await?;
    let ctx = view_context(&deployment, &identity, &paged.items).await?;
    let paged = paged.map(|goal| GoalView::build(goal, &ctx));
    Ok(ResponseJson(Page::build(paged, request, &uri)?))
}

pub async fn create_goal(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<CreateGoal>,
) -> Result<(StatusCode, ResponseJson<GoalView>), ApiError> {
    let goal = Goal::create(&deployment.db().pool, &identity, &payload).await?;
    tracing::info!(goal_id = goal.id, user_id = identity.user_id, "Goal created");
    let view = render(&deployment, &identity, goal).await?;
    Ok((StatusCode::CREATED, ResponseJson(view)))
}

pub async fn get_goal(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(goal): Extension<Goal>,
) -> Result<ResponseJson<GoalView>, ApiError> {
    Ok(ResponseJson(render(&deployment, &identity, goal).await?))
}

pub async fn replace_goal(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Goal>,
    ApiJson(payload): ApiJson<UpdateGoal>,
) -> Result<ResponseJson<GoalView>, ApiError> {
    let goal = Goal::update(&deployment.db().pool, existing.id, &payload, false).await?;
    Ok(ResponseJson(render(&deployment, &identity, goal).await?))
}

pub async fn update_goal(
    State(deployment): State<DeploymentImpl>,
    Extension(identity): Extension<Identity>,
    Extension(existing): Extension<Goal>,
    ApiJson(payload): ApiJson<UpdateGoal>,
) -> Result<ResponseJson<GoalView>, ApiError> {
    let goal = Goal::update(&deployment.db().pool, existing.id, &payload, true).await?;
    Ok(ResponseJson(render(&deployment, &identity, goal).await?))
}

pub async fn delete_goal(
    State(deployment): State<DeploymentImpl>,
    Extension(goal): Extension<Goal>,
) -> Result<StatusCode, ApiError> {
    Goal::delete(&deployment.db().pool, goal.id).await?;
    tracing::info!(goal_id = goal.id, "Goal deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn render(
    deployment: &DeploymentImpl,
    identity: &Identity,
    goal: Goal,
) -> Result<GoalView, ApiError> {
    let ctx = view_context(deployment, identity, std::slice::from_ref(&goal)).await?;
    Ok(GoalView::build(goal, &ctx))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let item = route_both(
        Router::new(),
        "/goals/{goal_id}",
        get(get_goal)
            .put(replace_goal)
            .patch(update_goal)
            .delete(delete_goal),
    )
    .route_layer(from_fn_with_state(
        deployment.clone(),
        load_goal_middleware::<DeploymentImpl>,
    ));

    route_both(Router::new(), "/goals", get(get_goals).post(create_goal)).merge(item)
}
