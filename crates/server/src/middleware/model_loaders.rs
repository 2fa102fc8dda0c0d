use std::future::Future;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::{
    DBService, DbErr,
    models::{focus::Focus, goal::Goal, label::Label, task::Task},
    ownership::{Identity, Owned, authorize},
};
use deployment::Deployment;

use crate::error::ApiError;

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

/// Object-level gate: a malformed or unknown id is 404, someone else's record
/// is 403. Runs after the identity middleware.
async fn load_request_extension<M, F, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    raw_id: &str,
    load: F,
) -> Result<Response, ApiError>
where
    M: Owned + Clone + Send + Sync + 'static,
    F: FnOnce(i64) -> Fut,
    Fut: Future<Output = Result<Option<M>, DbErr>>,
{
    let Ok(model_id) = raw_id.parse::<i64>() else {
        tracing::warn!(model = model_name, id = raw_id, "Malformed id");
        return Err(ApiError::NotFound);
    };
    let Some(model) = load(model_id).await? else {
        tracing::warn!(model = model_name, id = model_id, "Record not found");
        return Err(ApiError::NotFound);
    };

    let Some(identity) = request.extensions().get::<Identity>() else {
        return Err(ApiError::NotAuthenticated);
    };
    if !authorize(identity, &model) {
        tracing::warn!(
            path = %request.uri().path(),
            method = %request.method(),
            user_id = identity.user_id,
            model = model_name,
            id = model_id,
            reason = "not_owner",
            "Permission denied"
        );
        return Err(ApiError::Forbidden);
    }

    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

fn respond(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(IntoResponse::into_response)
}

pub async fn load_focus_middleware<S>(
    State(deployment): State<S>,
    Path(focus_id): Path<String>,
    request: Request,
    next: Next,
) -> Response
where
    S: ModelLoaderDeps,
{
    let db = &deployment.db_service().pool;
    respond(
        load_request_extension(request, next, "Focus", &focus_id, |id| {
            Focus::find_by_id(db, id)
        })
        .await,
    )
}

pub async fn load_goal_middleware<S>(
    State(deployment): State<S>,
    Path(goal_id): Path<String>,
    request: Request,
    next: Next,
) -> Response
where
    S: ModelLoaderDeps,
{
    let db = &deployment.db_service().pool;
    respond(
        load_request_extension(request, next, "Goal", &goal_id, |id| {
            Goal::find_by_id(db, id)
        })
        .await,
    )
}

pub async fn load_task_middleware<S>(
    State(deployment): State<S>,
    Path(task_id): Path<String>,
    request: Request,
    next: Next,
) -> Response
where
    S: ModelLoaderDeps,
{
    let db = &deployment.db_service().pool;
    respond(
        load_request_extension(request, next, "Task", &task_id, |id| {
            Task::find_by_id(db, id)
        })
        .await,
    )
}

pub async fn load_label_middleware<S>(
    State(deployment): State<S>,
    Path(label_id): Path<String>,
    request: Request,
    next: Next,
) -> Response
where
    S: ModelLoaderDeps,
{
    let db = &deployment.db_service().pool;
    respond(
        load_request_extension(request, next, "Label", &label_id, |id| {
            Label::find_by_id(db, id)
        })
        .await,
    )
}
