//! # Hikkoshi Shared Library
//!
//! This crate contains the domain types, persistence and business logic used by
//! the Hikkoshi API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `membership`: Invite tokens, households and the membership binder
//! - `auth`: Authentication utilities (passwords, JWT, request context)
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod membership;
pub mod models;

/// Current version of the Hikkoshi shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
