/// Storage collaborators
///
/// The core (session guard, ownership resolver, decision point, cascade
/// manager) talks to persistence only through these traits:
///
/// - [`AccountStore`]: credential store access (lookup by id/email, active flag)
/// - [`EntityStore`]: tasks, comments and files, with active-only and
///   including-deleted lookups and bulk soft-delete by parent
///
/// Two implementations ship with the crate: [`PgStore`] over sqlx/PostgreSQL
/// and [`MemoryStore`] for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Account, Comment, FileRecord, NewAccount, NewComment, NewFile, NewTask, ParentRef, Task,
    TaskChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored record breaks a model invariant
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Which records a lookup may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Only records that are not soft-deleted
    Active,

    /// Soft-deleted records too
    IncludingDeleted,
}

/// A set of child records addressed by their parent, for bulk soft-delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildSet {
    /// Comments whose `task_id` is the given task
    CommentsOfTask(Uuid),

    /// Files attached directly to the given task
    FilesOfTask(Uuid),

    /// Files attached to any of the given comments
    FilesOfComments(Vec<Uuid>),
}

/// Credential store access
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates an active account
    ///
    /// Returns `StoreError::Conflict` if the email is already registered.
    async fn create_account(&self, data: NewAccount, now: DateTime<Utc>) -> StoreResult<Account>;

    /// Finds an account by ID
    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Finds an account by email, case-insensitively
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Sets the active flag
    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>>;
}

/// Task, comment and file persistence
///
/// Single-record updates must be atomic per record. Soft-delete operations
/// only touch live records, so re-running them never moves an existing
/// `deleted_at`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_task(&self, data: NewTask, now: DateTime<Utc>) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Task>>;

    /// Applies changes to a live task; `None` if absent or deleted
    async fn update_task(
        &self,
        id: Uuid,
        changes: TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>>;

    /// Live tasks the account owns or is assigned to
    async fn list_tasks_for(&self, account_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Marks a live task deleted; `false` if it was not live
    async fn soft_delete_task(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn create_comment(&self, data: NewComment, now: DateTime<Utc>) -> StoreResult<Comment>;

    async fn find_comment(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Comment>>;

    async fn update_comment(
        &self,
        id: Uuid,
        body: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Comment>>;

    /// Live comments on a task
    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>>;

    /// Every comment ID on a task, including soft-deleted ones
    async fn comment_ids_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn soft_delete_comment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn create_file(&self, data: NewFile, now: DateTime<Utc>) -> StoreResult<FileRecord>;

    async fn find_file(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<FileRecord>>;

    /// Live files attached directly to a parent
    async fn list_files(&self, parent: ParentRef) -> StoreResult<Vec<FileRecord>>;

    async fn soft_delete_file(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Soft-deletes every live record in `children`, returning how many changed
    async fn bulk_soft_delete(&self, children: ChildSet, at: DateTime<Utc>) -> StoreResult<u64>;
}
