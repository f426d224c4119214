/// Database models for Taskweave
///
/// Each model carries its record type, its input types and inherent sqlx
/// operations against PostgreSQL. The core never calls these directly; it
/// goes through the [`crate::store`] traits, which `PgStore` implements on
/// top of them.
///
/// # Models
///
/// - `account`: Identities, credential hashes, roles, active flag
/// - `task`: Tasks with owner/assignee and soft-delete
/// - `comment`: Comments on tasks
/// - `file`: File metadata attached to exactly one task or comment

pub mod account;
pub mod comment;
pub mod file;
pub mod task;

pub use account::{Account, AccountRole, NewAccount};
pub use comment::{Comment, NewComment};
pub use file::{FileRecord, InvalidParentRef, NewFile, ParentRef};
pub use task::{NewTask, Task, TaskChanges, TaskPriority, TaskStatus};
