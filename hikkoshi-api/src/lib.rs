//! # Hikkoshi API Server Library
//!
//! HTTP layer for Hikkoshi, a shared moving checklist for households.
//! Handlers are thin: they validate input, build a `RequestContext` and call
//! into `hikkoshi_shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `mailer`: Outbound email (password reset links)
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod routes;
