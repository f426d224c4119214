/// Task endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks` - Tasks the caller owns or is assigned to
/// - `POST /v1/tasks` - Create a task; the caller becomes its owner
/// - `GET /v1/tasks/:id` - Read a task
/// - `PATCH /v1/tasks/:id` - Update fields (assignees may only send `status`)
/// - `DELETE /v1/tasks/:id` - Soft-delete the task with its comments and files
///
/// Tasks the caller has no relation to answer `404`, exactly like tasks that
/// do not exist.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use taskweave_shared::{
    auth::{authorization::TaskAction, session::Identity},
    models::{NewTask, Task, TaskChanges, TaskPriority},
};
use uuid::Uuid;
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub description: Option<String>,

    /// Defaults to `medium`
    pub priority: Option<TaskPriority>,

    pub due_date: Option<DateTime<Utc>>,

    /// Account to delegate the task to
    pub assignee_id: Option<Uuid>,
}

/// Lists live tasks the caller owns or is assigned to, newest first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = state.entities.list_tasks_for(identity.account_id).await?;
    Ok(Json(tasks))
}

/// Creates a task owned by the caller
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Bad title, or the assignee does not exist
pub async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    if let Some(assignee_id) = req.assignee_id {
        ensure_account_exists(&state, assignee_id).await?;
    }

    let task = state
        .entities
        .create_task(
            NewTask {
                owner_id: identity.account_id,
                assignee_id: req.assignee_id,
                title: req.title,
                description: req.description,
                priority: req.priority.unwrap_or(TaskPriority::Medium),
                due_date: req.due_date,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(task_id = %task.id, owner_id = %identity.account_id, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

/// Reads a task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let relation = state.access.task(&identity, task_id, TaskAction::Read).await?;
    Ok(Json(relation.task))
}

/// Applies a partial update
///
/// Fields left out are untouched; `null` clears `description`, `due_date`
/// or `assignee_id`.
///
/// # Errors
///
/// - `403 Forbidden` (`field_restricted`): An assignee sent fields other than `status`
/// - `404 Not Found`: Task missing, deleted, or not visible to the caller
/// - `422 Unprocessable Entity`: Unknown field, bad title, or unknown assignee
pub async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    ApiJson(changes): ApiJson<TaskChanges>,
) -> ApiResult<Json<Task>> {
    state
        .access
        .task(&identity, task_id, TaskAction::Write(&changes))
        .await?;

    changes.validate()?;
    if let Some(Some(assignee_id)) = changes.assignee_id {
        ensure_account_exists(&state, assignee_id).await?;
    }

    let fields = changes.present_fields().join(",");
    let task = state
        .entities
        .update_task(task_id, changes, state.clock.now())
        .await?
        // Deleted between the check and the write
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    tracing::info!(
        task_id = %task_id,
        account_id = %identity.account_id,
        fields = %fields,
        "Task updated"
    );

    Ok(Json(task))
}

/// Deletes a task, cascading to its comments and files
///
/// The owner may repeat the call on an already-deleted task to finish a
/// cascade that was interrupted.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.access.task_deletion(&identity, task_id).await?;

    state
        .cascade
        .delete_task(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_account_exists(state: &AppState, account_id: Uuid) -> ApiResult<()> {
    match state.accounts.find_account(account_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
            "assignee_id",
            "Assignee does not exist",
        )])),
    }
}
