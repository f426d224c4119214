//! # Taskweave API Server Library
//!
//! HTTP surface over `taskweave-shared`: cookie-carried sessions in front of
//! task, comment and file routes that ask the decision point before every
//! read or mutation.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON extractor with API-shaped rejections
//! - `middleware`: Session cookies and the session layer
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
