/// File metadata endpoints
///
/// # Endpoints
///
/// - `POST /v1/files` - Register a file on a task or a comment
/// - `GET /v1/tasks/:id/files` - Files attached directly to a task
/// - `GET /v1/comments/:id/files` - Files attached to a comment
/// - `GET /v1/files/:id` - Read file metadata
/// - `DELETE /v1/files/:id` - Soft-delete (uploader or owner of the effective task)
///
/// A file names exactly one of `task_id` or `comment_id`. Anything else is
/// rejected with `400` before any lookup happens.

use crate::{app::AppState, error::ApiResult, extract::ApiJson};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskweave_shared::{
    auth::{
        authorization::{AccessError, CommentAction, FileAction, TaskAction},
        session::Identity,
    },
    models::{FileRecord, NewFile, ParentRef},
};
use uuid::Uuid;
use validator::Validate;

/// Register file request
///
/// The bytes themselves are uploaded to blob storage out of band; this
/// records where they are.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateFileRequest {
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "File name must be 1-255 characters"))]
    pub file_name: String,

    #[validate(length(min = 1, max = 255, message = "Content type must be 1-255 characters"))]
    pub content_type: String,

    #[validate(range(min = 0, message = "Size must not be negative"))]
    pub size_bytes: i64,

    #[validate(length(min = 1, max = 512, message = "Storage key must be 1-512 characters"))]
    pub storage_key: String,
}

/// Registers file metadata
///
/// # Errors
///
/// - `400 Bad Request`: Zero or both of `task_id` / `comment_id`
/// - `404 Not Found`: Parent missing, deleted, or not visible to the caller
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<CreateFileRequest>,
) -> ApiResult<(StatusCode, Json<FileRecord>)> {
    let parent =
        ParentRef::from_parts(req.task_id, req.comment_id).map_err(AccessError::from)?;

    state.access.attach_to(&identity, parent).await?;
    req.validate()?;

    let file = state
        .entities
        .create_file(
            NewFile {
                parent,
                uploader_id: identity.account_id,
                file_name: req.file_name,
                content_type: req.content_type,
                size_bytes: req.size_bytes,
                storage_key: req.storage_key,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(
        file_id = %file.id,
        parent = ?file.parent,
        uploader_id = %identity.account_id,
        "File registered"
    );

    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn list_task_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<FileRecord>>> {
    state
        .access
        .task(&identity, task_id, TaskAction::AttachFile)
        .await?;

    let files = state.entities.list_files(ParentRef::Task(task_id)).await?;
    Ok(Json(files))
}

pub async fn list_comment_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<Vec<FileRecord>>> {
    state
        .access
        .comment(&identity, comment_id, CommentAction::Read)
        .await?;

    let files = state
        .entities
        .list_files(ParentRef::Comment(comment_id))
        .await?;
    Ok(Json(files))
}

pub async fn get_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<FileRecord>> {
    let relation = state
        .access
        .file(&identity, file_id, FileAction::Read)
        .await?;
    Ok(Json(relation.file))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .access
        .file(&identity, file_id, FileAction::Delete)
        .await?;

    if state
        .entities
        .soft_delete_file(file_id, state.clock.now())
        .await?
    {
        tracing::info!(file_id = %file_id, account_id = %identity.account_id, "File deleted");
    }

    Ok(StatusCode::NO_CONTENT)
}
