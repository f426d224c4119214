//! # Taskweave Shared Library
//!
//! Core of the Taskweave task tracker: the session lifecycle, the
//! ownership-based access model over tasks, comments and files, and the
//! soft-delete cascade. The HTTP server in `taskweave-api` is a thin layer
//! over this crate.
//!
//! ## Module Organization
//!
//! - `clock`: Injectable time source
//! - `auth`: Token issuer, session guard, ownership resolver, decision point
//! - `cascade`: Soft-delete propagation Task → Comment → File
//! - `models`: Records and their PostgreSQL queries
//! - `store`: Storage traits with PostgreSQL and in-memory implementations
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod cascade;
pub mod clock;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the Taskweave shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
