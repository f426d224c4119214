/// Comment endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks/:id/comments` - Live comments on a task, oldest first
/// - `POST /v1/tasks/:id/comments` - Comment on a task
/// - `GET /v1/comments/:id` - Read a comment
/// - `PATCH /v1/comments/:id` - Edit (author within the edit window, or task owner)
/// - `DELETE /v1/comments/:id` - Soft-delete the comment and its files

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskweave_shared::{
    auth::{
        authorization::{CommentAction, TaskAction},
        session::Identity,
    },
    models::{Comment, NewComment},
};
use uuid::Uuid;
use validator::Validate;

/// Comment body, for both create and edit
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Body must be 1-10000 characters"))]
    pub body: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    state
        .access
        .task(&identity, task_id, TaskAction::Comment)
        .await?;

    let comments = state.entities.list_comments(task_id).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    state
        .access
        .task(&identity, task_id, TaskAction::Comment)
        .await?;
    req.validate()?;

    let comment = state
        .entities
        .create_comment(
            NewComment {
                task_id,
                author_id: identity.account_id,
                body: req.body,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(
        comment_id = %comment.id,
        task_id = %task_id,
        author_id = %identity.account_id,
        "Comment created"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<Comment>> {
    let relation = state
        .access
        .comment(&identity, comment_id, CommentAction::Read)
        .await?;
    Ok(Json(relation.comment))
}

/// Edits a comment's body
///
/// # Errors
///
/// - `403 Forbidden`: The author's edit window has closed, or the caller is
///   neither author nor task owner
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    state
        .access
        .comment(&identity, comment_id, CommentAction::Update)
        .await?;
    req.validate()?;

    let comment = state
        .entities
        .update_comment(comment_id, req.body, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::NotFound("Resource not found".to_string()))?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let relation = state
        .access
        .comment(&identity, comment_id, CommentAction::Delete)
        .await?;

    state.cascade.delete_comment(&relation.comment).await?;

    Ok(StatusCode::NO_CONTENT)
}
