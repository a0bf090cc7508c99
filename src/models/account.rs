//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity representing a user's ledger account
//! - `CreateAccountRequest`: Request body for opening an account
//! - `AccountResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to one user (via `user_id`)
/// - Has a balance stored in cents (to avoid floating-point errors)
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents. For example:
/// - $10.50 is stored as 1050 cents
/// - $100.00 is stored as 10000 cents
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,

    /// Owner of this account
    ///
    /// Queries on behalf of a user always filter by `user_id`.
    pub user_id: Uuid,

    pub account_name: String,

    /// Current balance in cents (not dollars)
    ///
    /// Must be >= 0 (enforced by database CHECK constraint).
    pub balance_cents: i64,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    pub created_at: DateTime<Utc>,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

/// Request body for opening a new account.
///
/// ```json
/// {
///   "account_name": "Savings",
///   "currency": "EUR"
/// }
/// ```
///
/// New accounts always start at a zero balance; money only enters through
/// the ledger (payments, transfers, admin adjustments).
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub account_name: String,

    /// Currency code (defaults to "USD" if not provided)
    #[serde(default = "default_currency")]
    pub currency: String,
}

pub fn default_currency() -> String {
    "USD".to_string()
}

/// Normalize and validate an ISO 4217-style currency code.
pub fn normalize_currency(currency: &str) -> Result<String, AppError> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(AppError::InvalidRequest(
            "Currency must be a 3-letter code".to_string(),
        ))
    }
}

/// Response body for account endpoints.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "account_name": "Main",
///   "balance_cents": 100000,
///   "currency": "USD",
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub account_name: String,
    pub balance_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            account_name: account.account_name,
            balance_cents: account.balance_cents,
            currency: account.currency,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}
