//! In-process fan-out of real-time notifications.
//!
//! Services publish [`Notification`]s addressed to a user; every connected
//! WebSocket session holds a broadcast receiver and forwards the events
//! [`should_deliver`] accepts for its caller.

use std::collections::HashSet;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    middleware::auth::AuthContext,
    models::{
        notification::{Notification, NotificationEvent},
        withdrawal::Withdrawal,
    },
    services::transaction_service::LedgerOutcome,
};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event to one user. Never fails the caller.
    pub fn publish(&self, user_id: Uuid, event: NotificationEvent) {
        let name = event.name();
        match self.sender.send(Notification { user_id, event }) {
            Ok(receivers) => tracing::debug!(%user_id, event = name, receivers, "notification published"),
            Err(_) => tracing::debug!(%user_id, event = name, "no live subscribers"),
        }
    }

    /// Publish `transaction_update` and `balance_update` for a ledger movement.
    ///
    /// Each owner of an affected account gets the transaction once and a
    /// balance update per account they own.
    pub fn publish_ledger(&self, outcome: &LedgerOutcome) {
        if outcome.replayed {
            return;
        }

        let mut owners = HashSet::new();
        for account in &outcome.accounts {
            if owners.insert(account.user_id) {
                self.publish(
                    account.user_id,
                    NotificationEvent::TransactionUpdate {
                        transaction: outcome.transaction.clone().into(),
                    },
                );
            }
            self.publish(
                account.user_id,
                NotificationEvent::BalanceUpdate {
                    account_id: account.id,
                    balance_cents: account.balance_cents,
                    currency: account.currency.clone(),
                },
            );
        }
    }

    pub fn publish_withdrawal(&self, withdrawal: &Withdrawal) {
        self.publish(
            withdrawal.user_id,
            NotificationEvent::WithdrawalUpdate {
                withdrawal: withdrawal.clone().into(),
            },
        );
    }
}

/// Whether a subscriber should receive a notification.
///
/// Users receive their own events; admins additionally see every
/// withdrawal update so review queues stay live.
pub fn should_deliver(subscriber: &AuthContext, notification: &Notification) -> bool {
    if notification.user_id == subscriber.user_id {
        return true;
    }
    subscriber.is_admin()
        && matches!(notification.event, NotificationEvent::WithdrawalUpdate { .. })
}
