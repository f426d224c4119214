/// File metadata model and database operations
///
/// A File hangs off exactly one parent: either a Task or a Comment. The
/// relation is carried as [`ParentRef`], so a record with zero or two parents
/// cannot be constructed. The two-column storage form is converted at the
/// database boundary, and the table's `CHECK` constraint holds the same rule
/// at rest.
///
/// Only metadata lives here; the bytes are kept by an external blob store
/// under `storage_key`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE files (
///     id UUID PRIMARY KEY,
///     task_id UUID REFERENCES tasks(id),
///     comment_id UUID REFERENCES comments(id),
///     uploader_id UUID NOT NULL REFERENCES accounts(id),
///     file_name VARCHAR(255) NOT NULL,
///     content_type VARCHAR(255) NOT NULL,
///     size_bytes BIGINT NOT NULL,
///     storage_key VARCHAR(512) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ,
///     CONSTRAINT files_single_parent CHECK (num_nonnulls(task_id, comment_id) = 1)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{Lookup, StoreError};

/// The single parent a file is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    Task(Uuid),
    Comment(Uuid),
}

/// A file reference with zero or both parents set
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("A file must reference exactly one of task or comment")]
pub struct InvalidParentRef;

impl ParentRef {
    /// Builds a parent reference from the two optional wire fields
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParentRef`] unless exactly one field is set.
    pub fn from_parts(task: Option<Uuid>, comment: Option<Uuid>) -> Result<Self, InvalidParentRef> {
        match (task, comment) {
            (Some(task_id), None) => Ok(ParentRef::Task(task_id)),
            (None, Some(comment_id)) => Ok(ParentRef::Comment(comment_id)),
            _ => Err(InvalidParentRef),
        }
    }

    /// Splits into the `(task_id, comment_id)` column pair
    pub fn into_parts(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            ParentRef::Task(id) => (Some(id), None),
            ParentRef::Comment(id) => (None, Some(id)),
        }
    }
}

/// File metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique file ID
    pub id: Uuid,

    /// Task or comment the file is attached to
    pub parent: ParentRef,

    /// Account that uploaded the file
    pub uploader_id: Uuid,

    /// Original file name
    pub file_name: String,

    /// MIME type
    pub content_type: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// Key of the blob in external storage
    pub storage_key: String,

    /// When the file was registered
    pub created_at: DateTime<Utc>,

    /// Soft-delete timestamp (None = live)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Whether the file has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for registering a file
#[derive(Debug, Clone)]
pub struct NewFile {
    pub parent: ParentRef,
    pub uploader_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

/// Storage form of a file row, with the parent split across two columns
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    task_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    uploader_id: Uuid,
    file_name: String,
    content_type: String,
    size_bytes: i64,
    storage_key: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = StoreError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let parent = ParentRef::from_parts(row.task_id, row.comment_id)
            .map_err(|e| StoreError::Corrupt(format!("file {}: {}", row.id, e)))?;

        Ok(FileRecord {
            id: row.id,
            parent,
            uploader_id: row.uploader_id,
            file_name: row.file_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            storage_key: row.storage_key,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

const FILE_COLUMNS: &str = "id, task_id, comment_id, uploader_id, file_name, content_type, \
                            size_bytes, storage_key, created_at, deleted_at";

impl FileRecord {
    /// Inserts file metadata
    pub async fn create(
        pool: &PgPool,
        data: NewFile,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let (task_id, comment_id) = data.parent.into_parts();
        let query = format!(
            "INSERT INTO files (id, task_id, comment_id, uploader_id, file_name, content_type, \
                                size_bytes, storage_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            FILE_COLUMNS
        );

        let row = sqlx::query_as::<_, FileRow>(&query)
            .bind(Uuid::new_v4())
            .bind(task_id)
            .bind(comment_id)
            .bind(data.uploader_id)
            .bind(data.file_name)
            .bind(data.content_type)
            .bind(data.size_bytes)
            .bind(data.storage_key)
            .bind(now)
            .fetch_one(pool)
            .await?;

        row.try_into()
    }

    /// Finds a file by ID
    pub async fn find(pool: &PgPool, id: Uuid, lookup: Lookup) -> Result<Option<Self>, StoreError> {
        let filter = match lookup {
            Lookup::Active => " AND deleted_at IS NULL",
            Lookup::IncludingDeleted => "",
        };
        let query = format!("SELECT {} FROM files WHERE id = $1{}", FILE_COLUMNS, filter);

        sqlx::query_as::<_, FileRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(FileRecord::try_from)
            .transpose()
    }

    /// Lists live files attached directly to a parent, oldest first
    pub async fn list_by_parent(pool: &PgPool, parent: ParentRef) -> Result<Vec<Self>, StoreError> {
        let column = match parent {
            ParentRef::Task(_) => "task_id",
            ParentRef::Comment(_) => "comment_id",
        };
        let (ParentRef::Task(parent_id) | ParentRef::Comment(parent_id)) = parent;
        let query = format!(
            "SELECT {} FROM files WHERE {} = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
            FILE_COLUMNS, column
        );

        sqlx::query_as::<_, FileRow>(&query)
            .bind(parent_id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(FileRecord::try_from)
            .collect()
    }

    /// Marks a live file deleted
    pub async fn soft_delete(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE files SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks every live file attached directly to a task deleted
    pub async fn soft_delete_by_task(
        pool: &PgPool,
        task_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE files SET deleted_at = $2 WHERE task_id = $1 AND deleted_at IS NULL",
        )
        .bind(task_id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks every live file attached to any of the given comments deleted
    pub async fn soft_delete_by_comments(
        pool: &PgPool,
        comment_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if comment_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE files SET deleted_at = $2 WHERE comment_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(comment_ids)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_ref_from_parts() {
        let task_id = Uuid::new_v4();
        let comment_id = Uuid::new_v4();

        assert_eq!(ParentRef::from_parts(Some(task_id), None), Ok(ParentRef::Task(task_id)));
        assert_eq!(
            ParentRef::from_parts(None, Some(comment_id)),
            Ok(ParentRef::Comment(comment_id))
        );
        assert_eq!(ParentRef::from_parts(None, None), Err(InvalidParentRef));
        assert_eq!(
            ParentRef::from_parts(Some(task_id), Some(comment_id)),
            Err(InvalidParentRef)
        );
    }

    #[test]
    fn test_parent_ref_serialization() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ParentRef::Comment(id)).unwrap();
        assert_eq!(json["kind"], "comment");
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn test_row_with_both_parents_is_corrupt() {
        let row = FileRow {
            id: Uuid::new_v4(),
            task_id: Some(Uuid::new_v4()),
            comment_id: Some(Uuid::new_v4()),
            uploader_id: Uuid::new_v4(),
            file_name: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 1,
            storage_key: "k".to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };

        assert!(matches!(FileRecord::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
