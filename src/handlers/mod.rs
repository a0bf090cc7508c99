//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates business logic to `services`
//! 3. Returns HTTP response (JSON, status code)

/// Account management endpoints
pub mod accounts;
pub mod admin;
/// Registration, login and session endpoints
pub mod auth;
pub mod health;
/// WebSocket notification stream
pub mod notifications;
pub mod payments;
/// Ledger reads, transfers and admin adjustments
pub mod transactions;
/// Withdrawal requests and the admin approval workflow
pub mod withdrawals;
