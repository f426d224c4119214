/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, logout and the current identity
/// - `accounts`: Account activation (admin)
/// - `tasks`: Task CRUD with cascade delete
/// - `comments`: Comments on tasks
/// - `files`: File metadata attached to a task or a comment
///
/// Every handler behind the session layer receives the caller as an
/// `Extension<Identity>` and asks the decision point before touching an
/// entity.

pub mod accounts;
pub mod auth;
pub mod comments;
pub mod files;
pub mod health;
pub mod tasks;
