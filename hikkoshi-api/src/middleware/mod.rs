/// Middleware modules for the API server
///
/// Authentication lives in `hikkoshi_shared::auth::middleware` and is wired
/// up per route group in `app`.

pub mod security;
