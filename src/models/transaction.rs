//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: Database entity representing a ledger movement
//! - `LedgerEntry`: Input to the credit/debit primitives
//! - Request types for transfers and admin adjustments
//! - `TransactionResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - Has a unique ID and optional idempotency key
/// - References one or two accounts (depending on type)
/// - Stores amount in cents
/// - Carries optional JSON metadata linking it to a withdrawal or payment
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Optional idempotency key for preventing duplicates
    ///
    /// Replaying the same key returns the original transaction instead of
    /// moving money again.
    pub idempotency_key: Option<String>,

    /// "credit", "debit" or "transfer"
    pub transaction_type: String,

    /// Source account (for debit and transfer)
    pub from_account_id: Option<Uuid>,

    /// Destination account (for credit and transfer)
    pub to_account_id: Option<Uuid>,

    /// Must be positive (enforced by CHECK constraint)
    pub amount_cents: i64,

    pub currency: String,

    pub description: Option<String>,

    pub status: String,

    pub created_at: DateTime<Utc>,

    /// e.g. `{"withdrawal_id": "..."}` or `{"payment_id": "..."}`
    pub metadata: Option<serde_json::Value>,
}

impl Transaction {
    /// True when this row records the movement described by the arguments.
    ///
    /// A replayed idempotency key is only honoured for the same movement.
    pub fn is_same_movement(
        &self,
        transaction_type: &str,
        from_account_id: Option<Uuid>,
        to_account_id: Option<Uuid>,
        amount_cents: i64,
    ) -> bool {
        self.transaction_type == transaction_type
            && self.from_account_id == from_account_id
            && self.to_account_id == to_account_id
            && self.amount_cents == amount_cents
    }
}

/// Namespace a caller-supplied idempotency key.
///
/// Server-derived keys (`withdrawal:<id>`, `nowpayments:<id>`) live in their
/// own prefixes, so a client key can never claim one of them. Blank keys
/// are treated as absent.
pub fn client_idempotency_key(scope: &str, owner: Uuid, key: Option<&str>) -> Option<String> {
    let key = key.map(str::trim).filter(|k| !k.is_empty())?;
    Some(format!("{scope}:{owner}:{key}"))
}

/// One side of a balance movement handed to the ledger primitives.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn new(account_id: Uuid, amount_cents: i64) -> Self {
        Self {
            account_id,
            amount_cents,
            description: None,
            idempotency_key: None,
            metadata: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Request to transfer money from one of the caller's accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "description": "Rent share",
///   "idempotency_key": "rent-2025-12"
/// }
/// ```
///
/// # Atomicity Guarantee
///
/// BOTH accounts are updated in the same database transaction.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Admin manual balance adjustment (credit or debit).
///
/// ```json
/// {
///   "amount_cents": 5000,
///   "description": "Goodwill credit",
///   "idempotency_key": "adj-2025-0042"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Pagination for transaction listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    /// Limit clamped to 1..=100 (default 50).
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Response returned for transaction operations.
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "transaction_type": "transfer",
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "currency": "USD",
///   "description": "Rent share",
///   "status": "completed",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub transaction_type: String,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Removes internal fields like metadata and idempotency_key.
impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            transaction_type: transaction.transaction_type,
            from_account_id: transaction.from_account_id,
            to_account_id: transaction.to_account_id,
            amount_cents: transaction.amount_cents,
            currency: transaction.currency,
            description: transaction.description,
            status: transaction.status,
            created_at: transaction.created_at,
        }
    }
}
