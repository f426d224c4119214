/// Comment model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY,
///     task_id UUID NOT NULL REFERENCES tasks(id),
///     author_id UUID NOT NULL REFERENCES accounts(id),
///     body TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::Lookup;

/// Comment on a task
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    /// Unique comment ID
    pub id: Uuid,

    /// Parent task
    pub task_id: Uuid,

    /// Account that wrote the comment
    pub author_id: Uuid,

    /// Comment text
    pub body: String,

    /// When the comment was created (start of the edit window)
    pub created_at: DateTime<Utc>,

    /// When the comment was last edited
    pub updated_at: DateTime<Utc>,

    /// Soft-delete timestamp (None = live)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Whether the comment has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

const COMMENT_COLUMNS: &str = "id, task_id, author_id, body, created_at, updated_at, deleted_at";

impl Comment {
    /// Inserts a new comment
    pub async fn create(
        pool: &PgPool,
        data: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO comments (id, task_id, author_id, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING {}",
            COMMENT_COLUMNS
        );

        sqlx::query_as::<_, Comment>(&query)
            .bind(Uuid::new_v4())
            .bind(data.task_id)
            .bind(data.author_id)
            .bind(data.body)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Finds a comment by ID
    pub async fn find(pool: &PgPool, id: Uuid, lookup: Lookup) -> Result<Option<Self>, sqlx::Error> {
        let filter = match lookup {
            Lookup::Active => " AND deleted_at IS NULL",
            Lookup::IncludingDeleted => "",
        };
        let query = format!("SELECT {} FROM comments WHERE id = $1{}", COMMENT_COLUMNS, filter);

        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the body of a live comment
    pub async fn update_body(
        pool: &PgPool,
        id: Uuid,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE comments SET body = $2, updated_at = $3 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            COMMENT_COLUMNS
        );

        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(body)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Lists live comments on a task, oldest first
    pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM comments WHERE task_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
            COMMENT_COLUMNS
        );

        sqlx::query_as::<_, Comment>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// IDs of every comment on a task, deleted or not
    pub async fn ids_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM comments WHERE task_id = $1")
            .bind(task_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Marks a live comment deleted
    pub async fn soft_delete(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks every live comment on a task deleted
    pub async fn soft_delete_by_task(
        pool: &PgPool,
        task_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = $2 WHERE task_id = $1 AND deleted_at IS NULL",
        )
        .bind(task_id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
