//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and provider calls.

pub mod ai_service;
pub mod auth_service;
pub mod notifier;
pub mod nowpayments;
pub mod payment_service;
pub mod transaction_service;
pub mod withdrawal_service;
