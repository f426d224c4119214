/// In-memory store
///
/// Implements both store traits over hash maps behind a single
/// `tokio::sync::RwLock`. Every trait method takes the lock once, which gives
/// the same per-record atomicity the PostgreSQL store gets from single-row
/// `UPDATE`s. Used by the test suites and for running the API without a
/// database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, ChildSet, EntityStore, Lookup, StoreError, StoreResult};
use crate::models::account::normalize_email;
use crate::models::{
    Account, Comment, FileRecord, NewAccount, NewComment, NewFile, NewTask, ParentRef, Task,
    TaskChanges, TaskStatus,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    tasks: HashMap<Uuid, Task>,
    comments: HashMap<Uuid, Comment>,
    files: HashMap<Uuid, FileRecord>,
}

/// Store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn visible(deleted_at: Option<DateTime<Utc>>, lookup: Lookup) -> bool {
    lookup == Lookup::IncludingDeleted || deleted_at.is_none()
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, data: NewAccount, now: DateTime<Utc>) -> StoreResult<Account> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&data.email);

        if tables.accounts.values().any(|a| a.email == email) {
            return Err(StoreError::Conflict("accounts_email_key".to_string()));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email,
            password_hash: data.password_hash,
            role: data.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.is_active = active;
            account.updated_at = now;
            account.clone()
        }))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_task(&self, data: NewTask, now: DateTime<Utc>) -> StoreResult<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            assignee_id: data.assignee_id,
            title: data.title,
            description: data.description,
            status: TaskStatus::Todo,
            priority: data.priority,
            due_date: data.due_date,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables.write().await.tasks.insert(task.id, task.clone());

        Ok(task)
    }

    async fn find_task(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Task>> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .get(&id)
            .filter(|t| visible(t.deleted_at, lookup))
            .cloned())
    }

    async fn update_task(
        &self,
        id: Uuid,
        changes: TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.tasks.get_mut(&id).filter(|t| !t.is_deleted()) else {
            return Ok(None);
        };

        changes.apply(task);
        task.updated_at = now;

        Ok(Some(task.clone()))
    }

    async fn list_tasks_for(&self, account_id: Uuid) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| !t.is_deleted())
            .filter(|t| t.owner_id == account_id || t.assignee_id == Some(account_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(tasks)
    }

    async fn soft_delete_task(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id).filter(|t| !t.is_deleted()) {
            Some(task) => {
                task.deleted_at = Some(at);
                task.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_comment(&self, data: NewComment, now: DateTime<Utc>) -> StoreResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            author_id: data.author_id,
            body: data.body,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables
            .write()
            .await
            .comments
            .insert(comment.id, comment.clone());

        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<Comment>> {
        Ok(self
            .tables
            .read()
            .await
            .comments
            .get(&id)
            .filter(|c| visible(c.deleted_at, lookup))
            .cloned())
    }

    async fn update_comment(
        &self,
        id: Uuid,
        body: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_deleted())
            .map(|comment| {
                comment.body = body;
                comment.updated_at = now;
                comment.clone()
            }))
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.task_id == task_id && !c.is_deleted())
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(comments)
    }

    async fn comment_ids_for_task(&self, task_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .tables
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .map(|c| c.id)
            .collect())
    }

    async fn soft_delete_comment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.comments.get_mut(&id).filter(|c| !c.is_deleted()) {
            Some(comment) => {
                comment.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_file(&self, data: NewFile, now: DateTime<Utc>) -> StoreResult<FileRecord> {
        let file = FileRecord {
            id: Uuid::new_v4(),
            parent: data.parent,
            uploader_id: data.uploader_id,
            file_name: data.file_name,
            content_type: data.content_type,
            size_bytes: data.size_bytes,
            storage_key: data.storage_key,
            created_at: now,
            deleted_at: None,
        };
        self.tables.write().await.files.insert(file.id, file.clone());

        Ok(file)
    }

    async fn find_file(&self, id: Uuid, lookup: Lookup) -> StoreResult<Option<FileRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .files
            .get(&id)
            .filter(|f| visible(f.deleted_at, lookup))
            .cloned())
    }

    async fn list_files(&self, parent: ParentRef) -> StoreResult<Vec<FileRecord>> {
        let tables = self.tables.read().await;
        let mut files: Vec<FileRecord> = tables
            .files
            .values()
            .filter(|f| f.parent == parent && !f.is_deleted())
            .cloned()
            .collect();
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(files)
    }

    async fn soft_delete_file(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.files.get_mut(&id).filter(|f| !f.is_deleted()) {
            Some(file) => {
                file.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn bulk_soft_delete(&self, children: ChildSet, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;

        match children {
            ChildSet::CommentsOfTask(task_id) => {
                for comment in tables.comments.values_mut() {
                    if comment.task_id == task_id && !comment.is_deleted() {
                        comment.deleted_at = Some(at);
                        changed += 1;
                    }
                }
            }
            ChildSet::FilesOfTask(task_id) => {
                for file in tables.files.values_mut() {
                    if file.parent == ParentRef::Task(task_id) && !file.is_deleted() {
                        file.deleted_at = Some(at);
                        changed += 1;
                    }
                }
            }
            ChildSet::FilesOfComments(comment_ids) => {
                for file in tables.files.values_mut() {
                    let attached = matches!(file.parent, ParentRef::Comment(id) if comment_ids.contains(&id));
                    if attached && !file.is_deleted() {
                        file.deleted_at = Some(at);
                        changed += 1;
                    }
                }
            }
        }

        Ok(changed)
    }
}
