/// Resource ownership resolver
///
/// Computes how an actor relates to a Task, Comment or File. A relation
/// carries the entity itself together with the flags the decision point
/// needs, so callers do not fetch the entity twice.
///
/// Soft-deleted entities resolve as absent, and so do entities whose parent
/// chain is soft-deleted: a live comment on a deleted task has no relation.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Comment, FileRecord, ParentRef, Task};
use crate::store::{EntityStore, Lookup, StoreResult};

/// Actor's relation to a task
#[derive(Debug, Clone)]
pub struct TaskRelation {
    pub task: Task,
    pub is_owner: bool,
    pub is_assignee: bool,
}

impl TaskRelation {
    pub fn new(task: Task, actor: Uuid) -> Self {
        Self {
            is_owner: task.owner_id == actor,
            is_assignee: task.assignee_id == Some(actor),
            task,
        }
    }

    /// Read-Task capability
    pub fn can_read(&self) -> bool {
        self.is_owner || self.is_assignee
    }
}

/// Actor's relation to a comment
#[derive(Debug, Clone)]
pub struct CommentRelation {
    pub comment: Comment,
    pub is_author: bool,
    pub is_parent_task_owner: bool,

    /// Relation to the task the comment belongs to
    pub task: TaskRelation,
}

/// Actor's relation to a file
#[derive(Debug, Clone)]
pub struct FileRelation {
    pub file: FileRecord,
    pub is_uploader: bool,

    /// Owner of the effective parent task, reached through the comment when
    /// the file is attached to one
    pub is_parent_owner: bool,

    /// Relation to the effective parent task
    pub task: TaskRelation,
}

/// Resolves actor/entity relations against the entity store
#[derive(Clone)]
pub struct OwnershipResolver {
    store: Arc<dyn EntityStore>,
}

impl OwnershipResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Relation to a live task
    pub async fn task(&self, actor: Uuid, task_id: Uuid) -> StoreResult<Option<TaskRelation>> {
        let task = self.store.find_task(task_id, Lookup::Active).await?;
        Ok(task.map(|task| TaskRelation::new(task, actor)))
    }

    /// Relation to a task whether or not it is soft-deleted
    pub async fn task_any(&self, actor: Uuid, task_id: Uuid) -> StoreResult<Option<TaskRelation>> {
        let task = self.store.find_task(task_id, Lookup::IncludingDeleted).await?;
        Ok(task.map(|task| TaskRelation::new(task, actor)))
    }

    /// Relation to a live comment on a live task
    pub async fn comment(
        &self,
        actor: Uuid,
        comment_id: Uuid,
    ) -> StoreResult<Option<CommentRelation>> {
        let Some(comment) = self.store.find_comment(comment_id, Lookup::Active).await? else {
            return Ok(None);
        };
        let Some(task) = self.task(actor, comment.task_id).await? else {
            return Ok(None);
        };

        Ok(Some(CommentRelation {
            is_author: comment.author_id == actor,
            is_parent_task_owner: task.is_owner,
            comment,
            task,
        }))
    }

    /// Relation to the task a parent reference ultimately points at
    ///
    /// A task parent resolves directly; a comment parent resolves through its
    /// (live) comment to the comment's task.
    pub async fn effective_task(
        &self,
        actor: Uuid,
        parent: ParentRef,
    ) -> StoreResult<Option<TaskRelation>> {
        match parent {
            ParentRef::Task(task_id) => self.task(actor, task_id).await,
            ParentRef::Comment(comment_id) => Ok(self
                .comment(actor, comment_id)
                .await?
                .map(|relation| relation.task)),
        }
    }

    /// Relation to a live file with a live parent chain
    pub async fn file(&self, actor: Uuid, file_id: Uuid) -> StoreResult<Option<FileRelation>> {
        let Some(file) = self.store.find_file(file_id, Lookup::Active).await? else {
            return Ok(None);
        };
        let Some(task) = self.effective_task(actor, file.parent).await? else {
            return Ok(None);
        };

        Ok(Some(FileRelation {
            is_uploader: file.uploader_id == actor,
            is_parent_owner: task.is_owner,
            file,
            task,
        }))
    }
}
