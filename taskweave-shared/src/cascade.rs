/// Cascade manager
///
/// Propagates soft-delete down the Task → Comment → File hierarchy.
///
/// The cascade is a short sequence of bulk updates, not a transaction. Each
/// step only touches live rows, so re-running it after a partial failure
/// completes the remaining steps and leaves already-deleted rows (and their
/// original `deleted_at`) alone.
///
/// Callers are expected to have passed the access check first; the manager
/// itself does no authorization.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::models::Comment;
use crate::store::{ChildSet, EntityStore, Lookup, StoreResult};

/// Rows changed by one cascade run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Whether this run marked the root itself deleted
    pub root_deleted: bool,
    pub comments: u64,
    pub files: u64,
}

/// Runs soft-delete cascades against the entity store
#[derive(Clone)]
pub struct CascadeManager {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl CascadeManager {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Soft-deletes a task, its comments, and every file under either
    ///
    /// Re-invoking on an already-deleted task is not an error. Returns `None`
    /// only if the task never existed.
    pub async fn delete_task(&self, task_id: Uuid) -> StoreResult<Option<CascadeReport>> {
        if self
            .store
            .find_task(task_id, Lookup::IncludingDeleted)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let at = self.clock.now();
        let mut report = CascadeReport {
            root_deleted: self.store.soft_delete_task(task_id, at).await?,
            ..Default::default()
        };

        report.comments = self
            .store
            .bulk_soft_delete(ChildSet::CommentsOfTask(task_id), at)
            .await?;
        report.files = self
            .store
            .bulk_soft_delete(ChildSet::FilesOfTask(task_id), at)
            .await?;

        // Includes comments deleted before this run; their files still go.
        let comment_ids = self.store.comment_ids_for_task(task_id).await?;
        report.files += self
            .store
            .bulk_soft_delete(ChildSet::FilesOfComments(comment_ids), at)
            .await?;

        tracing::info!(
            task_id = %task_id,
            root_deleted = report.root_deleted,
            comments = report.comments,
            files = report.files,
            "Task delete cascaded"
        );

        Ok(Some(report))
    }

    /// Soft-deletes a comment and the files attached to it
    ///
    /// Files go first and the comment last: a deleted comment is invisible to
    /// the access check, so an interrupted run must leave it live for the
    /// caller to retry.
    pub async fn delete_comment(&self, comment: &Comment) -> StoreResult<CascadeReport> {
        let at = self.clock.now();
        let files = self
            .store
            .bulk_soft_delete(ChildSet::FilesOfComments(vec![comment.id]), at)
            .await?;

        let report = CascadeReport {
            root_deleted: self.store.soft_delete_comment(comment.id, at).await?,
            comments: 0,
            files,
        };

        tracing::info!(
            comment_id = %comment.id,
            task_id = %comment.task_id,
            files = report.files,
            "Comment delete cascaded"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{FileRecord, NewComment, NewFile, NewTask, ParentRef, Task, TaskPriority};
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, Utc};

    struct Tree {
        store: Arc<MemoryStore>,
        cascade: CascadeManager,
        clock: ManualClock,
        task: Task,
        comments: Vec<Comment>,
        files: Vec<FileRecord>,
    }

    async fn file_on(store: &MemoryStore, parent: ParentRef, now: DateTime<Utc>) -> FileRecord {
        store
            .create_file(
                NewFile {
                    parent,
                    uploader_id: Uuid::new_v4(),
                    file_name: "a.png".to_string(),
                    content_type: "image/png".to_string(),
                    size_bytes: 10,
                    storage_key: format!("blobs/{}", Uuid::new_v4()),
                },
                now,
            )
            .await
            .unwrap()
    }

    /// One task with two comments, a file on the task and a file on each comment
    async fn tree() -> Tree {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new());
        let now = clock.now();
        let owner = Uuid::new_v4();

        let task = store
            .create_task(
                NewTask {
                    owner_id: owner,
                    assignee_id: None,
                    title: "Clean up".to_string(),
                    description: None,
                    priority: TaskPriority::Low,
                    due_date: None,
                },
                now,
            )
            .await
            .unwrap();

        let mut comments = Vec::new();
        for body in ["first", "second"] {
            comments.push(
                store
                    .create_comment(
                        NewComment {
                            task_id: task.id,
                            author_id: owner,
                            body: body.to_string(),
                        },
                        now,
                    )
                    .await
                    .unwrap(),
            );
        }

        let mut files = vec![file_on(&store, ParentRef::Task(task.id), now).await];
        for comment in &comments {
            files.push(file_on(&store, ParentRef::Comment(comment.id), now).await);
        }

        Tree {
            cascade: CascadeManager::new(store.clone(), Arc::new(clock.clone())),
            store,
            clock,
            task,
            comments,
            files,
        }
    }

    /// `deleted_at` of every row in the tree
    async fn snapshot(t: &Tree) -> Vec<Option<DateTime<Utc>>> {
        let mut out = Vec::new();
        let task = t.store.find_task(t.task.id, Lookup::IncludingDeleted).await.unwrap();
        out.push(task.and_then(|t| t.deleted_at));
        for c in &t.comments {
            let c = t.store.find_comment(c.id, Lookup::IncludingDeleted).await.unwrap();
            out.push(c.and_then(|c| c.deleted_at));
        }
        for f in &t.files {
            let f = t.store.find_file(f.id, Lookup::IncludingDeleted).await.unwrap();
            out.push(f.and_then(|f| f.deleted_at));
        }
        out
    }

    #[tokio::test]
    async fn test_delete_task_cascades_to_everything() {
        let t = tree().await;

        let report = t.cascade.delete_task(t.task.id).await.unwrap().unwrap();

        assert!(report.root_deleted);
        assert_eq!(report.comments, 2);
        assert_eq!(report.files, 3);
        assert!(snapshot(&t).await.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_delete_task_twice_is_idempotent() {
        let t = tree().await;

        t.cascade.delete_task(t.task.id).await.unwrap();
        let once = snapshot(&t).await;

        t.clock.advance(Duration::minutes(5));
        let second = t.cascade.delete_task(t.task.id).await.unwrap().unwrap();

        assert_eq!(second, CascadeReport::default());
        assert_eq!(snapshot(&t).await, once);
    }

    #[tokio::test]
    async fn test_rerun_completes_partial_cascade() {
        let t = tree().await;
        let now = t.clock.now();

        // Simulate a crash after the task and comments were marked.
        t.store.soft_delete_task(t.task.id, now).await.unwrap();
        t.store
            .bulk_soft_delete(ChildSet::CommentsOfTask(t.task.id), now)
            .await
            .unwrap();

        t.clock.advance(Duration::minutes(1));
        let report = t.cascade.delete_task(t.task.id).await.unwrap().unwrap();

        assert!(!report.root_deleted);
        assert_eq!(report.comments, 0);
        assert_eq!(report.files, 3);
        let states = snapshot(&t).await;
        assert!(states.iter().all(Option::is_some));
        assert_eq!(states[0], Some(now));
    }

    #[tokio::test]
    async fn test_delete_unknown_task_is_none() {
        let t = tree().await;
        assert!(t.cascade.delete_task(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_comment_only_touches_its_files() {
        let t = tree().await;

        let report = t.cascade.delete_comment(&t.comments[0]).await.unwrap();
        assert!(report.root_deleted);
        assert_eq!(report.files, 1);

        let states = snapshot(&t).await;
        // task, comment 0, comment 1, task file, file on comment 0, file on comment 1
        assert!(states[0].is_none());
        assert!(states[1].is_some());
        assert!(states[2].is_none());
        assert!(states[3].is_none());
        assert!(states[4].is_some());
        assert!(states[5].is_none());
    }

    #[tokio::test]
    async fn test_rerun_completes_partial_comment_cascade() {
        let t = tree().await;
        let now = t.clock.now();

        // Interrupted after the files step; the comment is still live.
        t.store
            .bulk_soft_delete(ChildSet::FilesOfComments(vec![t.comments[0].id]), now)
            .await
            .unwrap();
        assert!(t
            .store
            .find_comment(t.comments[0].id, Lookup::Active)
            .await
            .unwrap()
            .is_some());

        t.clock.advance(Duration::minutes(1));
        let report = t.cascade.delete_comment(&t.comments[0]).await.unwrap();

        assert!(report.root_deleted);
        assert_eq!(report.files, 0);
        let states = snapshot(&t).await;
        assert!(states[1].is_some());
        assert_eq!(states[4], Some(now));
    }
}
