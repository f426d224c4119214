/// PostgreSQL-backed store
///
/// Thin adapter from the store traits onto the models' sqlx operations.
/// Unique-constraint violations surface as [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountStore, ChildSet, EntityStore, Lookup, StoreError, StoreResult};
use crate::models::{
    Account, Comment, FileRecord, NewAccount, NewComment, NewFile, NewTask, ParentRef, Task,
    TaskChanges,
};

/// Store over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn conflict_or_database(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let what = db_err.constraint().unwrap_or("unique constraint").to_string();
            return StoreError::Conflict(what);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, data: NewAccount, now: DateTime<Utc>) -> StoreResult<Account> {
        Account::create(&self.pool, data, now)
            .await
            .map_err(conflict_or_database)
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(Account::find_by_id(&self.pool, id).await?)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(Account::find_by_email(&self.pool, email).await?)
    }

    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        Ok(Account::set_active(&self.pool, id, active, now).await?)
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn create_task(&self, data: NewTask, now: DateTime<Utc>) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, data, now).await?)
    }

    async fn find_task(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Task>> {
        Ok(Task::find(&self.pool, id, lookup).await?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        changes: TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        Ok(Task::update(&self.pool, id, changes, now).await?)
    }

    async fn list_tasks_for(&self, account_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(Task::list_for_participant(&self.pool, account_id).await?)
    }

    async fn soft_delete_task(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Task::soft_delete(&self.pool, id, at).await?)
    }

    async fn create_comment(&self, data: NewComment, now: DateTime<Utc>) -> StoreResult<Comment> {
        Ok(Comment::create(&self.pool, data, now).await?)
    }

    async fn find_comment(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Comment>> {
        Ok(Comment::find(&self.pool, id, lookup).await?)
    }

    async fn update_comment(
        &self,
        id: Uuid,
        body: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Comment>> {
        Ok(Comment::update_body(&self.pool, id, body, now).await?)
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        Ok(Comment::list_by_task(&self.pool, task_id).await?)
    }

    async fn comment_ids_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(Comment::ids_by_task(&self.pool, task_id).await?)
    }

    async fn soft_delete_comment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Comment::soft_delete(&self.pool, id, at).await?)
    }

    async fn create_file(&self, data: NewFile, now: DateTime<Utc>) -> StoreResult<FileRecord> {
        FileRecord::create(&self.pool, data, now).await
    }

    async fn find_file(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<FileRecord>> {
        FileRecord::find(&self.pool, id, lookup).await
    }

    async fn list_files(&self, parent: ParentRef) -> StoreResult<Vec<FileRecord>> {
        FileRecord::list_by_parent(&self.pool, parent).await
    }

    async fn soft_delete_file(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        FileRecord::soft_delete(&self.pool, id, at).await
    }

    async fn bulk_soft_delete(&self, children: ChildSet, at: DateTime<Utc>) -> StoreResult<u64> {
        match children {
            ChildSet::CommentsOfTask(task_id) => {
                Ok(Comment::soft_delete_by_task(&self.pool, task_id, at).await?)
            }
            ChildSet::FilesOfTask(task_id) => {
                FileRecord::soft_delete_by_task(&self.pool, task_id, at).await
            }
            ChildSet::FilesOfComments(comment_ids) => {
                FileRecord::soft_delete_by_comments(&self.pool, &comment_ids, at).await
            }
        }
    }
}
