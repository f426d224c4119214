/// Access control decision point
///
/// Maps an actor's relation to an entity and the requested operation onto an
/// explicit [`Verdict`]. Everything not allowed by a rule below is denied.
///
/// # Rules
///
/// | Operation                 | Allowed when                                              |
/// |---------------------------|-----------------------------------------------------------|
/// | Read task                 | owner or assignee                                         |
/// | Write task                | owner; assignee if `status` is the only field present     |
/// | Delete task               | owner (cascades)                                          |
/// | Create / read comment     | read access to the task                                   |
/// | Update comment            | author within the edit window, or task owner at any time  |
/// | Delete comment            | author or task owner                                      |
/// | Upload / read file        | read access to the effective parent task                  |
/// | Delete file               | uploader or owner of the effective parent task            |
///
/// # Participation
///
/// An actor participates in an entity when they can read its task or are the
/// entity's own author/uploader. Non-participants are always told
/// `DeniedNotFound`, the same answer as for a missing or soft-deleted entity,
/// so existence never leaks. Participants denied by a rule are told
/// `DeniedForbidden` or `DeniedFieldRestricted`.
///
/// # Example
///
/// ```no_run
/// use taskweave_shared::auth::authorization::{AccessControl, TaskAction};
/// use taskweave_shared::auth::session::Identity;
/// use uuid::Uuid;
///
/// # async fn example(access: AccessControl, actor: Identity, task_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let relation = access.task(&actor, task_id, TaskAction::Read).await?;
/// println!("{}", relation.task.title);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::ownership::{CommentRelation, FileRelation, OwnershipResolver, TaskRelation};
use super::session::Identity;
use crate::clock::Clock;
use crate::models::{InvalidParentRef, ParentRef, TaskChanges};
use crate::store::{EntityStore, StoreError};

/// Error type for access checks
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Missing, soft-deleted, or not visible to this actor
    #[error("Resource not found")]
    NotFound,

    /// Visible, but a rule denies the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Fields outside the actor's writable set were submitted
    #[error("Not allowed to modify: {}", .0.join(", "))]
    FieldRestricted(Vec<String>),

    /// File parent reference with zero or both parents
    #[error(transparent)]
    InvalidReference(#[from] InvalidParentRef),

    /// Entity store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an access decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    DeniedNotFound,
    DeniedForbidden(String),
    DeniedFieldRestricted(Vec<String>),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// Converts a denial into the matching [`AccessError`]
    pub fn into_result(self) -> Result<(), AccessError> {
        match self {
            Verdict::Allowed => Ok(()),
            Verdict::DeniedNotFound => Err(AccessError::NotFound),
            Verdict::DeniedForbidden(reason) => Err(AccessError::Forbidden(reason)),
            Verdict::DeniedFieldRestricted(fields) => Err(AccessError::FieldRestricted(fields)),
        }
    }
}

fn forbidden(reason: &str) -> Verdict {
    Verdict::DeniedForbidden(reason.to_string())
}

/// Operations on a task
#[derive(Debug, Clone, Copy)]
pub enum TaskAction<'a> {
    Read,
    Write(&'a TaskChanges),
    Delete,
    /// Add a comment, or list the task's comments
    Comment,
    /// Attach a file, or list the task's files
    AttachFile,
}

/// Operations on an existing comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Read,
    Update,
    Delete,
}

/// Operations on an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Delete,
}

/// The rule set, with its one tunable
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    /// How long after creation an author may still edit a comment (inclusive)
    pub comment_edit_window: Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            comment_edit_window: Duration::hours(24),
        }
    }
}

impl AccessPolicy {
    /// Decides a task operation; `None` means the task is absent or deleted
    pub fn decide_task(&self, relation: Option<&TaskRelation>, action: TaskAction<'_>) -> Verdict {
        let Some(relation) = relation else {
            return Verdict::DeniedNotFound;
        };
        if !relation.can_read() {
            return Verdict::DeniedNotFound;
        }

        match action {
            TaskAction::Read | TaskAction::Comment | TaskAction::AttachFile => Verdict::Allowed,
            TaskAction::Write(_) if relation.is_owner => Verdict::Allowed,
            TaskAction::Write(changes) => {
                let restricted: Vec<String> = changes
                    .present_fields()
                    .into_iter()
                    .filter(|field| *field != "status")
                    .map(str::to_string)
                    .collect();

                if restricted.is_empty() {
                    Verdict::Allowed
                } else {
                    Verdict::DeniedFieldRestricted(restricted)
                }
            }
            TaskAction::Delete if relation.is_owner => Verdict::Allowed,
            TaskAction::Delete => forbidden("only the task owner may delete a task"),
        }
    }

    /// Decides a comment operation at time `now`
    pub fn decide_comment(
        &self,
        relation: Option<&CommentRelation>,
        action: CommentAction,
        now: DateTime<Utc>,
    ) -> Verdict {
        let Some(relation) = relation else {
            return Verdict::DeniedNotFound;
        };
        let can_read_task = relation.task.can_read();
        if !can_read_task && !relation.is_author {
            return Verdict::DeniedNotFound;
        }

        match action {
            CommentAction::Read if can_read_task => Verdict::Allowed,
            CommentAction::Read => forbidden("no read access to the comment's task"),
            CommentAction::Update if relation.is_parent_task_owner => Verdict::Allowed,
            CommentAction::Update if relation.is_author => {
                let deadline = relation.comment.created_at + self.comment_edit_window;
                if now <= deadline {
                    Verdict::Allowed
                } else {
                    forbidden("the edit window for this comment has closed")
                }
            }
            CommentAction::Update => forbidden("only the author or task owner may edit a comment"),
            CommentAction::Delete if relation.is_author || relation.is_parent_task_owner => {
                Verdict::Allowed
            }
            CommentAction::Delete => {
                forbidden("only the author or task owner may delete a comment")
            }
        }
    }

    /// Decides a file operation
    pub fn decide_file(&self, relation: Option<&FileRelation>, action: FileAction) -> Verdict {
        let Some(relation) = relation else {
            return Verdict::DeniedNotFound;
        };
        let can_read_task = relation.task.can_read();
        if !can_read_task && !relation.is_uploader {
            return Verdict::DeniedNotFound;
        }

        match action {
            FileAction::Read if can_read_task => Verdict::Allowed,
            FileAction::Read => forbidden("no read access to the file's task"),
            FileAction::Delete if relation.is_uploader || relation.is_parent_owner => {
                Verdict::Allowed
            }
            FileAction::Delete => forbidden("only the uploader or task owner may delete a file"),
        }
    }
}

/// Decision point bound to the entity store and clock
///
/// Each method resolves the actor's relation, decides, and on `Allowed`
/// returns the relation so the caller can act on the entity it carries.
#[derive(Clone)]
pub struct AccessControl {
    resolver: OwnershipResolver,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn EntityStore>, policy: AccessPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: OwnershipResolver::new(store),
            policy,
            clock,
        }
    }

    pub async fn task(
        &self,
        actor: &Identity,
        task_id: Uuid,
        action: TaskAction<'_>,
    ) -> Result<TaskRelation, AccessError> {
        let relation = self.resolver.task(actor.account_id, task_id).await?;
        let verdict = self.policy.decide_task(relation.as_ref(), action);
        log_denial(actor, "task", task_id, &verdict);
        verdict.into_result()?;

        relation.ok_or(AccessError::NotFound)
    }

    /// Checks a task delete
    ///
    /// Same as [`task`](Self::task) with [`TaskAction::Delete`], except that
    /// the owner of an already soft-deleted task is still allowed, so an
    /// interrupted cascade can be re-run to completion.
    pub async fn task_deletion(
        &self,
        actor: &Identity,
        task_id: Uuid,
    ) -> Result<TaskRelation, AccessError> {
        match self.task(actor, task_id, TaskAction::Delete).await {
            Err(AccessError::NotFound) => {
                match self.resolver.task_any(actor.account_id, task_id).await? {
                    Some(relation) if relation.task.deleted_at.is_some() && relation.is_owner => {
                        Ok(relation)
                    }
                    _ => Err(AccessError::NotFound),
                }
            }
            other => other,
        }
    }

    pub async fn comment(
        &self,
        actor: &Identity,
        comment_id: Uuid,
        action: CommentAction,
    ) -> Result<CommentRelation, AccessError> {
        let relation = self.resolver.comment(actor.account_id, comment_id).await?;
        let verdict = self
            .policy
            .decide_comment(relation.as_ref(), action, self.clock.now());
        log_denial(actor, "comment", comment_id, &verdict);
        verdict.into_result()?;

        relation.ok_or(AccessError::NotFound)
    }

    pub async fn file(
        &self,
        actor: &Identity,
        file_id: Uuid,
        action: FileAction,
    ) -> Result<FileRelation, AccessError> {
        let relation = self.resolver.file(actor.account_id, file_id).await?;
        let verdict = self.policy.decide_file(relation.as_ref(), action);
        log_denial(actor, "file", file_id, &verdict);
        verdict.into_result()?;

        relation.ok_or(AccessError::NotFound)
    }

    /// Checks that files may be attached to (or listed under) a parent
    ///
    /// Returns the relation to the effective parent task.
    pub async fn attach_to(
        &self,
        actor: &Identity,
        parent: ParentRef,
    ) -> Result<TaskRelation, AccessError> {
        let relation = self.resolver.effective_task(actor.account_id, parent).await?;
        let verdict = self
            .policy
            .decide_task(relation.as_ref(), TaskAction::AttachFile);
        let (ParentRef::Task(parent_id) | ParentRef::Comment(parent_id)) = parent;
        log_denial(actor, "file parent", parent_id, &verdict);
        verdict.into_result()?;

        relation.ok_or(AccessError::NotFound)
    }
}

fn log_denial(actor: &Identity, kind: &str, id: Uuid, verdict: &Verdict) {
    if !verdict.is_allowed() {
        tracing::warn!(
            account_id = %actor.account_id,
            entity = kind,
            entity_id = %id,
            verdict = ?verdict,
            "Access denied"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{
        AccountRole, Comment, FileRecord, NewComment, NewFile, NewTask, Task, TaskPriority,
        TaskStatus,
    };
    use crate::store::MemoryStore;

    fn identity(account_id: Uuid) -> Identity {
        Identity {
            account_id,
            email: format!("{}@example.com", account_id),
            role: AccountRole::User,
        }
    }

    fn task(owner: Uuid, assignee: Option<Uuid>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            owner_id: owner,
            assignee_id: assignee,
            title: "Quarterly report".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn status_only() -> TaskChanges {
        TaskChanges {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        }
    }

    #[test]
    fn test_assignee_status_only_allowed() {
        let (owner, assignee) = (Uuid::new_v4(), Uuid::new_v4());
        let relation = TaskRelation::new(task(owner, Some(assignee)), assignee);
        let policy = AccessPolicy::default();

        let verdict = policy.decide_task(Some(&relation), TaskAction::Write(&status_only()));
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[test]
    fn test_assignee_extra_field_restricted() {
        let (owner, assignee) = (Uuid::new_v4(), Uuid::new_v4());
        let relation = TaskRelation::new(task(owner, Some(assignee)), assignee);
        let changes = TaskChanges {
            title: Some("Renamed".to_string()),
            ..status_only()
        };

        let verdict = AccessPolicy::default().decide_task(Some(&relation), TaskAction::Write(&changes));
        assert_eq!(verdict, Verdict::DeniedFieldRestricted(vec!["title".to_string()]));
    }

    #[test]
    fn test_owner_may_write_any_field() {
        let owner = Uuid::new_v4();
        let relation = TaskRelation::new(task(owner, None), owner);
        let changes = TaskChanges {
            title: Some("Renamed".to_string()),
            assignee_id: Some(Some(Uuid::new_v4())),
            ..status_only()
        };

        let verdict = AccessPolicy::default().decide_task(Some(&relation), TaskAction::Write(&changes));
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[test]
    fn test_third_party_gets_not_found() {
        let (owner, assignee) = (Uuid::new_v4(), Uuid::new_v4());
        let relation = TaskRelation::new(task(owner, Some(assignee)), Uuid::new_v4());
        let policy = AccessPolicy::default();

        for action in [
            TaskAction::Read,
            TaskAction::Write(&status_only()),
            TaskAction::Delete,
            TaskAction::Comment,
        ] {
            assert_eq!(policy.decide_task(Some(&relation), action), Verdict::DeniedNotFound);
        }
        assert_eq!(policy.decide_task(None, TaskAction::Read), Verdict::DeniedNotFound);
    }

    #[test]
    fn test_assignee_cannot_delete_task() {
        let (owner, assignee) = (Uuid::new_v4(), Uuid::new_v4());
        let relation = TaskRelation::new(task(owner, Some(assignee)), assignee);

        let verdict = AccessPolicy::default().decide_task(Some(&relation), TaskAction::Delete);
        assert!(matches!(verdict, Verdict::DeniedForbidden(_)));
    }

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Allowed.into_result().is_ok());
        assert!(matches!(
            Verdict::DeniedNotFound.into_result(),
            Err(AccessError::NotFound)
        ));
        assert!(matches!(
            Verdict::DeniedFieldRestricted(vec!["title".into()]).into_result(),
            Err(AccessError::FieldRestricted(fields)) if fields == vec!["title".to_string()]
        ));
    }

    struct Scenario {
        store: Arc<MemoryStore>,
        access: AccessControl,
        clock: ManualClock,
        u1: Identity,
        u2: Identity,
        u3: Identity,
        task: Task,
        comment: Comment,
        file: FileRecord,
    }

    /// Task{owner U1, assignee U2}, Comment{author U2}, File{uploader U3, on the comment}
    async fn scenario() -> Scenario {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new());
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = clock.now();

        let task = store
            .create_task(
                NewTask {
                    owner_id: u1,
                    assignee_id: Some(u2),
                    title: "Migrate billing".to_string(),
                    description: None,
                    priority: TaskPriority::High,
                    due_date: None,
                },
                now,
            )
            .await
            .unwrap();
        let comment = store
            .create_comment(
                NewComment {
                    task_id: task.id,
                    author_id: u2,
                    body: "Attached the logs".to_string(),
                },
                now,
            )
            .await
            .unwrap();
        let file = store
            .create_file(
                NewFile {
                    parent: ParentRef::Comment(comment.id),
                    uploader_id: u3,
                    file_name: "billing.log".to_string(),
                    content_type: "text/plain".to_string(),
                    size_bytes: 2048,
                    storage_key: "blobs/billing.log".to_string(),
                },
                now,
            )
            .await
            .unwrap();

        Scenario {
            access: AccessControl::new(
                store.clone(),
                AccessPolicy::default(),
                Arc::new(clock.clone()),
            ),
            store,
            clock,
            u1: identity(u1),
            u2: identity(u2),
            u3: identity(u3),
            task,
            comment,
            file,
        }
    }

    #[tokio::test]
    async fn test_comment_edit_by_author_at_creation() {
        let s = scenario().await;
        let result = s.access.comment(&s.u2, s.comment.id, CommentAction::Update).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_comment_edit_window_is_inclusive() {
        let s = scenario().await;
        s.clock.advance(Duration::hours(24));

        let result = s.access.comment(&s.u2, s.comment.id, CommentAction::Update).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_comment_edit_by_author_after_window_forbidden() {
        let s = scenario().await;
        s.clock.advance(Duration::hours(25));

        let result = s.access.comment(&s.u2, s.comment.id, CommentAction::Update).await;
        assert!(matches!(result, Err(AccessError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_comment_edit_by_task_owner_after_window_allowed() {
        let s = scenario().await;
        s.clock.advance(Duration::hours(25));

        let result = s.access.comment(&s.u1, s.comment.id, CommentAction::Update).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_comment_hidden_from_non_participant() {
        let s = scenario().await;

        // U3 uploaded to the comment but has no relation to the task or comment.
        let result = s.access.comment(&s.u3, s.comment.id, CommentAction::Read).await;
        assert!(matches!(result, Err(AccessError::NotFound)));
    }

    #[tokio::test]
    async fn test_file_delete_by_uploader_allowed() {
        let s = scenario().await;
        let result = s.access.file(&s.u3, s.file.id, FileAction::Delete).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_file_delete_by_transitive_task_owner_allowed() {
        let s = scenario().await;
        let result = s.access.file(&s.u1, s.file.id, FileAction::Delete).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_file_delete_by_comment_author_forbidden() {
        let s = scenario().await;

        // Authoring the parent comment does not grant delete on other people's files.
        let result = s.access.file(&s.u2, s.file.id, FileAction::Delete).await;
        assert!(matches!(result, Err(AccessError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_uploader_without_task_access_cannot_read_file() {
        let s = scenario().await;
        let result = s.access.file(&s.u3, s.file.id, FileAction::Read).await;
        assert!(matches!(result, Err(AccessError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_deleted_task_deletion_only_for_owner() {
        let s = scenario().await;
        s.store
            .soft_delete_task(s.task.id, s.clock.now())
            .await
            .unwrap();

        let read = s.access.task(&s.u1, s.task.id, TaskAction::Read).await;
        assert!(matches!(read, Err(AccessError::NotFound)));

        let retry = s.access.task_deletion(&s.u1, s.task.id).await.unwrap();
        assert_eq!(retry.task.id, s.task.id);

        let assignee = s.access.task_deletion(&s.u2, s.task.id).await;
        assert!(matches!(assignee, Err(AccessError::NotFound)));

        let unknown = s.access.task_deletion(&s.u1, Uuid::new_v4()).await;
        assert!(matches!(unknown, Err(AccessError::NotFound)));
    }

    #[tokio::test]
    async fn test_attach_to_comment_resolves_task() {
        let s = scenario().await;

        let relation = s
            .access
            .attach_to(&s.u2, ParentRef::Comment(s.comment.id))
            .await
            .unwrap();
        assert_eq!(relation.task.id, s.task.id);

        let denied = s.access.attach_to(&s.u3, ParentRef::Task(s.task.id)).await;
        assert!(matches!(denied, Err(AccessError::NotFound)));
    }

    #[test]
    fn test_invalid_parent_reference() {
        let task_id = Uuid::new_v4();
        let comment_id = Uuid::new_v4();

        let both: Result<ParentRef, AccessError> =
            ParentRef::from_parts(Some(task_id), Some(comment_id)).map_err(AccessError::from);
        assert!(matches!(both, Err(AccessError::InvalidReference(_))));

        let neither: Result<ParentRef, AccessError> =
            ParentRef::from_parts(None, None).map_err(AccessError::from);
        assert!(matches!(neither, Err(AccessError::InvalidReference(_))));
    }
}
