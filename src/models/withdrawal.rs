//! Withdrawal request models and the approval status machine.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──process──▶ PROCESSED
//!    │
//!    └────reject─────▶ REJECTED
//! ```
//!
//! Funds leave the account when the request is approved, not when it is
//! created. REJECTED and PROCESSED are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Rejected => "REJECTED",
            WithdrawalStatus::Processed => "PROCESSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Rejected | WithdrawalStatus::Processed)
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Processed)
        )
    }

    /// Validate a transition, returning the target status on success.
    pub fn transition(self, next: WithdrawalStatus) -> Result<WithdrawalStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidStatusTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(WithdrawalStatus::Pending),
            "APPROVED" => Ok(WithdrawalStatus::Approved),
            "REJECTED" => Ok(WithdrawalStatus::Rejected),
            "PROCESSED" => Ok(WithdrawalStatus::Processed),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown withdrawal status: {other}"
            ))),
        }
    }
}

/// Payout rail for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalMethod {
    Crypto,
    Bank,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethod::Crypto => "crypto",
            WithdrawalMethod::Bank => "bank",
        }
    }
}

/// Represents a withdrawal record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    /// "crypto" or "bank"
    pub method: String,
    /// Wallet address or bank reference
    pub destination: String,
    /// Stored upper-case, see [`WithdrawalStatus`]
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Payout reference from the rail (tx hash, bank reference)
    pub external_reference: Option<String>,
    /// Ledger debit created on approval
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn status(&self) -> Result<WithdrawalStatus, AppError> {
        self.status
            .parse()
            .map_err(|_| AppError::Internal(format!("corrupt withdrawal status: {}", self.status)))
    }
}

/// Admin listing row: a withdrawal joined with requester details.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalWithUser {
    #[sqlx(flatten)]
    pub withdrawal: Withdrawal,
    pub user_email: String,
    pub user_trust_score: i32,
}

/// Request body for `POST /api/withdrawals`.
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount_cents": 25000,
///   "method": "crypto",
///   "destination": "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub method: WithdrawalMethod,
    pub destination: String,
}

/// Body for `POST /api/withdrawals/{id}/approve`.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveWithdrawalRequest {
    pub notes: Option<String>,
}

/// Body for `POST /api/withdrawals/{id}/reject`.
#[derive(Debug, Deserialize)]
pub struct RejectWithdrawalRequest {
    pub reason: String,
}

/// Body for `POST /api/withdrawals/{id}/process`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessWithdrawalRequest {
    /// On-chain transaction hash or bank transfer reference
    pub external_reference: Option<String>,
}

/// Query for `GET /api/admin/withdrawals`.
#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalFilter {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub method: String,
    pub destination: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id,
            account_id: w.account_id,
            amount_cents: w.amount_cents,
            currency: w.currency,
            method: w.method,
            destination: w.destination,
            status: w.status,
            admin_notes: w.admin_notes,
            reviewed_at: w.reviewed_at,
            processed_at: w.processed_at,
            external_reference: w.external_reference,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

/// Admin view: includes requester identity, trust score and reviewer.
#[derive(Debug, Serialize)]
pub struct AdminWithdrawalResponse {
    #[serde(flatten)]
    pub withdrawal: WithdrawalResponse,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_trust_score: i32,
    pub reviewed_by: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
}

impl From<WithdrawalWithUser> for AdminWithdrawalResponse {
    fn from(row: WithdrawalWithUser) -> Self {
        let user_id = row.withdrawal.user_id;
        let reviewed_by = row.withdrawal.reviewed_by;
        let transaction_id = row.withdrawal.transaction_id;
        Self {
            withdrawal: row.withdrawal.into(),
            user_id,
            user_email: row.user_email,
            user_trust_score: row.user_trust_score,
            reviewed_by,
            transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WithdrawalStatus::*;

    #[test]
    fn allowed_transitions() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Processed));
    }

    #[test]
    fn everything_else_is_rejected() {
        let all = [Pending, Approved, Rejected, Processed];
        let allowed = [(Pending, Approved), (Pending, Rejected), (Approved, Processed)];
        for from in all {
            for to in all {
                if allowed.contains(&(from, to)) {
                    continue;
                }
                let err = from.transition(to).unwrap_err();
                assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Rejected, Processed] {
            assert!(terminal.is_terminal());
            for to in [Pending, Approved, Rejected, Processed] {
                assert!(!terminal.can_transition_to(to));
            }
        }
        assert!(!Pending.is_terminal());
        assert!(!Approved.is_terminal());
    }

    #[test]
    fn approved_cannot_skip_back_to_rejected() {
        let err = Approved.transition(Rejected).unwrap_err();
        assert_eq!(err.to_string(), "Cannot move withdrawal from APPROVED to REJECTED");
    }

    #[test]
    fn status_parses_any_case() {
        assert_eq!("pending".parse::<WithdrawalStatus>().unwrap(), Pending);
        assert!("cancelled".parse::<WithdrawalStatus>().is_err());
    }

    #[test]
    fn method_deserializes_lowercase() {
        let req: CreateWithdrawalRequest = serde_json::from_value(serde_json::json!({
            "account_id": Uuid::nil(),
            "amount_cents": 100,
            "method": "bank",
            "destination": "DE89370400440532013000"
        }))
        .unwrap();
        assert_eq!(req.method, WithdrawalMethod::Bank);
    }
}
