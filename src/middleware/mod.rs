//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Gate routes by role
//! - Short-circuit requests (reject unauthorized)

/// Session token authentication and admin gating
pub mod auth;
