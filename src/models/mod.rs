//! Data models representing database entities and API payloads.

/// Ledger account model
pub mod account;
/// Push notification events
pub mod notification;
/// Crypto payment model and status normalization
pub mod payment;
/// Ledger transaction model
pub mod transaction;
/// User model and auth payloads
pub mod user;
/// Withdrawal requests and their status machine
pub mod withdrawal;
