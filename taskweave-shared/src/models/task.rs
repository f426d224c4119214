/// Task model and database operations
///
/// A Task has exactly one owner (its creator) and at most one assignee. The
/// owner may change any field; the assignee may only move `status`. Tasks are
/// soft-deleted, and deleting one cascades to its Comments and Files (see
/// [`crate::cascade`]).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     owner_id UUID NOT NULL REFERENCES accounts(id),
///     assignee_id UUID REFERENCES accounts(id),
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::store::Lookup;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Finished
    Done,
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Task record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Account that created the task
    pub owner_id: Uuid,

    /// Account the task is delegated to
    pub assignee_id: Option<Uuid>,

    /// Short title
    pub title: String,

    /// Free-form description
    pub description: Option<String>,

    /// Workflow status
    pub status: TaskStatus,

    /// Priority
    pub priority: TaskPriority,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,

    /// Soft-delete timestamp (None = live)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the task has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Field changes applied to a live task
///
/// This is also the wire shape of a task update. `None` leaves a field
/// untouched; for nullable columns an explicit JSON `null` deserializes to
/// `Some(None)` and clears the value. Unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TaskChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<Uuid>>,
}

/// Marks a field as present even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TaskChanges {
    /// Names of the fields this change touches
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.due_date.is_some() {
            fields.push("due_date");
        }
        if self.assignee_id.is_some() {
            fields.push("assignee_id");
        }
        fields
    }

    /// Applies the changes to an in-memory task
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
    }
}

const TASK_COLUMNS: &str = "id, owner_id, assignee_id, title, description, status, priority, \
                            due_date, created_at, updated_at, deleted_at";

impl Task {
    /// Inserts a new task in `todo` status
    pub async fn create(
        pool: &PgPool,
        data: NewTask,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (id, owner_id, assignee_id, title, description, status, priority, \
                                due_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'todo', $6, $7, $8, $8) RETURNING {}",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(Uuid::new_v4())
            .bind(data.owner_id)
            .bind(data.assignee_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Finds a task by ID
    pub async fn find(pool: &PgPool, id: Uuid, lookup: Lookup) -> Result<Option<Self>, sqlx::Error> {
        let query = match lookup {
            Lookup::Active => format!(
                "SELECT {} FROM tasks WHERE id = $1 AND deleted_at IS NULL",
                TASK_COLUMNS
            ),
            Lookup::IncludingDeleted => format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS),
        };

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Applies field changes to a live task
    ///
    /// Returns `None` if the task does not exist or is soft-deleted.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        changes: TaskChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tasks SET updated_at = $2");
        let mut bind_count = 2;

        if changes.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if changes.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if changes.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if changes.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if changes.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }
        if changes.assignee_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assignee_id = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            TASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id).bind(now);

        if let Some(title) = changes.title {
            q = q.bind(title);
        }
        if let Some(description) = changes.description {
            q = q.bind(description);
        }
        if let Some(status) = changes.status {
            q = q.bind(status);
        }
        if let Some(priority) = changes.priority {
            q = q.bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            q = q.bind(due_date);
        }
        if let Some(assignee_id) = changes.assignee_id {
            q = q.bind(assignee_id);
        }

        q.fetch_optional(pool).await
    }

    /// Lists live tasks the account owns or is assigned to, newest first
    pub async fn list_for_participant(
        pool: &PgPool,
        account_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks \
             WHERE (owner_id = $1 OR assignee_id = $1) AND deleted_at IS NULL \
             ORDER BY created_at DESC",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Marks a live task deleted
    ///
    /// Returns `false` if the task was already deleted or does not exist; the
    /// original deletion timestamp is never overwritten.
    pub async fn soft_delete(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
