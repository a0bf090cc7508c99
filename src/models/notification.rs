//! Real-time notification events pushed to connected clients.
//!
//! # Wire Format
//!
//! Each event is a JSON text frame:
//!
//! ```json
//! { "event": "balance_update", "data": { "account_id": "...", "balance_cents": 1200, "currency": "USD" } }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{transaction::TransactionResponse, withdrawal::WithdrawalResponse};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum NotificationEvent {
    BalanceUpdate {
        account_id: Uuid,
        balance_cents: i64,
        currency: String,
    },
    TransactionUpdate {
        transaction: TransactionResponse,
    },
    WithdrawalUpdate {
        withdrawal: WithdrawalResponse,
    },
    BookingUpdate {
        booking_id: Uuid,
        status: String,
        message: Option<String>,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::BalanceUpdate { .. } => "balance_update",
            NotificationEvent::TransactionUpdate { .. } => "transaction_update",
            NotificationEvent::WithdrawalUpdate { .. } => "withdrawal_update",
            NotificationEvent::BookingUpdate { .. } => "booking_update",
        }
    }
}

/// An event addressed to one user.
#[derive(Debug, Clone)]
pub struct Notification {
    pub user_id: Uuid,
    pub event: NotificationEvent,
}

/// Query string for `GET /api/ws`.
///
/// Browsers cannot set headers on WebSocket handshakes, so the session
/// token travels in the query string.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Body for `POST /api/admin/notifications/booking`.
#[derive(Debug, Deserialize)]
pub struct BookingNotificationRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub status: String,
    pub message: Option<String>,
}
