//! Crypto payment models and provider status normalization.
//!
//! Payments are created locally first, then registered with NOWPayments.
//! The provider reports progress through IPN callbacks whose status strings
//! are normalized into [`PaymentStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Provider-independent payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    PartiallyPaid,
    Completed,
    Failed,
    Refunded,
    Expired,
    Unknown,
}

impl PaymentStatus {
    /// Map a NOWPayments `payment_status` value.
    ///
    /// | provider | normalized |
    /// |---|---|
    /// | waiting | Pending |
    /// | confirming, confirmed, sending | Processing |
    /// | partially_paid | PartiallyPaid |
    /// | finished | Completed |
    /// | failed | Failed |
    /// | refunded | Refunded |
    /// | expired | Expired |
    pub fn from_nowpayments(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "waiting" => PaymentStatus::Pending,
            "confirming" | "confirmed" | "sending" => PaymentStatus::Processing,
            "partially_paid" => PaymentStatus::PartiallyPaid,
            "finished" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "expired" => PaymentStatus::Expired,
            _ => PaymentStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Unknown => "unknown",
        }
    }

    /// Parse a value stored by [`PaymentStatus::as_str`].
    pub fn from_stored(status: &str) -> Self {
        match status {
            "pending" => PaymentStatus::Pending,
            "processing" => PaymentStatus::Processing,
            "partially_paid" => PaymentStatus::PartiallyPaid,
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "expired" => PaymentStatus::Expired,
            _ => PaymentStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Failed
                | PaymentStatus::Refunded
                | PaymentStatus::Expired
        )
    }

    /// Whether a callback reporting `next` may overwrite the current status.
    ///
    /// Callbacks can arrive late or out of order. Terminal states stick, with
    /// one exception: a completed payment can later be refunded.
    pub fn can_advance_to(&self, next: PaymentStatus) -> bool {
        if *self == next {
            return false;
        }
        if self.is_terminal() {
            return *self == PaymentStatus::Completed && next == PaymentStatus::Refunded;
        }
        next != PaymentStatus::Unknown
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a payment record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    /// Also sent to the provider as `order_id`
    pub id: Uuid,
    pub user_id: Uuid,
    /// Account credited when the payment completes
    pub account_id: Uuid,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    /// Crypto asset the customer pays with (e.g. "btc")
    pub pay_currency: String,
    pub pay_address: Option<String>,
    pub pay_amount: Option<f64>,
    pub status: String,
    pub credited_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_stored(&self.status)
    }
}

/// Request body for `POST /api/payments/crypto`.
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount_cents": 10000,
///   "pay_currency": "btc"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCryptoPaymentRequest {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub pay_currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub pay_currency: String,
    pub pay_address: Option<String>,
    pub pay_amount: Option<f64>,
    pub status: String,
    pub credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            account_id: p.account_id,
            provider: p.provider,
            provider_payment_id: p.provider_payment_id,
            amount_cents: p.amount_cents,
            currency: p.currency,
            pay_currency: p.pay_currency,
            pay_address: p.pay_address,
            pay_amount: p.pay_amount,
            status: p.status,
            credited_at: p.credited_at,
            created_at: p.created_at,
        }
    }
}

/// NOWPayments sends ids as numbers in some payloads and strings in others.
///
/// Goes through `serde_json::Value` rather than an untagged enum, which does
/// not see numbers under `arbitrary_precision`.
pub fn deserialize_provider_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(|id| id.to_string())
            .ok_or_else(|| de::Error::custom(format!("payment id {n} is not an unsigned integer"))),
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        other => Err(de::Error::custom(format!(
            "payment id must be a number or string, got {other}"
        ))),
    }
}

/// IPN callback body (fields this service reads).
///
/// ```json
/// {
///   "payment_id": 5077125051,
///   "payment_status": "finished",
///   "pay_address": "0xd1cDE08A07cD25adEbEd35c3867a59228C09B606",
///   "price_amount": 100,
///   "price_currency": "usd",
///   "pay_amount": 0.0015,
///   "actually_paid": 0.0015,
///   "pay_currency": "btc",
///   "order_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct IpnPayload {
    #[serde(deserialize_with = "deserialize_provider_id")]
    pub payment_id: String,
    pub payment_status: String,
    pub order_id: Option<String>,
    pub pay_currency: Option<String>,
    pub pay_amount: Option<f64>,
    pub actually_paid: Option<f64>,
    pub price_amount: Option<f64>,
    pub price_currency: Option<String>,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct IpnAck {
    pub received: bool,
    pub status: PaymentStatus,
    pub credited: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn nowpayments_statuses_normalize() {
        let cases = [
            ("waiting", Pending),
            ("confirming", Processing),
            ("confirmed", Processing),
            ("sending", Processing),
            ("partially_paid", PartiallyPaid),
            ("finished", Completed),
            ("FINISHED", Completed),
            ("failed", Failed),
            ("refunded", Refunded),
            ("expired", Expired),
            ("on_hold", Unknown),
            ("", Unknown),
        ];
        for (raw, expected) in cases {
            assert_eq!(PaymentStatus::from_nowpayments(raw), expected, "{raw}");
        }
    }

    #[test]
    fn stored_round_trip() {
        for status in [Pending, Processing, PartiallyPaid, Completed, Failed, Refunded, Expired] {
            assert_eq!(PaymentStatus::from_stored(status.as_str()), status);
        }
    }

    #[test]
    fn terminal_statuses_stick() {
        assert!(!Completed.can_advance_to(Pending));
        assert!(!Failed.can_advance_to(Completed));
        assert!(!Expired.can_advance_to(Processing));
        assert!(!Refunded.can_advance_to(Completed));
        assert!(Completed.can_advance_to(Refunded));
    }

    #[test]
    fn open_statuses_advance() {
        assert!(Pending.can_advance_to(Processing));
        assert!(Processing.can_advance_to(Completed));
        assert!(PartiallyPaid.can_advance_to(Completed));
        assert!(Pending.can_advance_to(Expired));
        assert!(!Pending.can_advance_to(Pending));
        assert!(!Pending.can_advance_to(Unknown));
    }

    #[test]
    fn ipn_payment_id_accepts_number_or_string() {
        let numeric: IpnPayload = serde_json::from_str(
            r#"{"payment_id": 5077125051, "payment_status": "waiting"}"#,
        )
        .unwrap();
        assert_eq!(numeric.payment_id, "5077125051");

        let text: IpnPayload =
            serde_json::from_str(r#"{"payment_id": "abc-1", "payment_status": "waiting"}"#)
                .unwrap();
        assert_eq!(text.payment_id, "abc-1");
    }

    #[test]
    fn ipn_payload_reads_small_amounts_and_rejects_fractional_ids() {
        let payload: IpnPayload = serde_json::from_str(
            r#"{"payment_id": 1, "payment_status": "finished", "actually_paid": 0.0000015}"#,
        )
        .unwrap();
        assert_eq!(payload.actually_paid, Some(0.0000015));

        let fractional = serde_json::from_str::<IpnPayload>(
            r#"{"payment_id": 1.5, "payment_status": "finished"}"#,
        );
        assert!(fractional.is_err());
    }
}
