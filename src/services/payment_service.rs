//! Crypto payment lifecycle: creation with the provider and IPN processing.
//!
//! # Crediting
//!
//! A payment credits its account exactly once: when a verified callback
//! moves it to `Completed` and `credited_at` is still empty. The credit, the
//! status change and `credited_at` are written in one database transaction
//! with the payment row locked, and the ledger entry carries the idempotency
//! key `nowpayments:<provider payment id>`.

use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        payment::{CreateCryptoPaymentRequest, IpnAck, IpnPayload, Payment, PaymentStatus},
        transaction::LedgerEntry,
    },
    services::{
        nowpayments::{self, CreatePaymentParams, NowPaymentsClient},
        transaction_service::{self, LedgerOutcome},
    },
};

/// Result of processing one IPN callback.
#[derive(Debug)]
pub struct IpnOutcome {
    pub ack: IpnAck,
    /// Payment after the callback was applied (unchanged when ignored)
    pub payment: Payment,
    /// Present when this callback credited the account
    pub ledger: Option<LedgerOutcome>,
}

fn normalize_pay_currency(pay_currency: &str) -> Result<String, AppError> {
    let code = pay_currency.trim().to_ascii_lowercase();
    if code.is_empty() || code.len() > 20 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidRequest(
            "pay_currency must be a provider ticker such as \"btc\"".to_string(),
        ));
    }
    Ok(code)
}

/// Cents to the provider's decimal major-unit amount.
fn cents_to_major(amount_cents: i64) -> f64 {
    amount_cents as f64 / 100.0
}

/// Status stored right after the provider accepts a new payment.
///
/// Unrecognised provider statuses leave the row `pending`.
fn initial_status(provider_status: &str) -> PaymentStatus {
    let reported = PaymentStatus::from_nowpayments(provider_status);
    if PaymentStatus::Pending.can_advance_to(reported) {
        reported
    } else {
        PaymentStatus::Pending
    }
}

/// Create a local payment and register it with NOWPayments.
///
/// # Errors
///
/// - `NotConfigured`: no provider API key (checked before anything is stored)
/// - `AccountNotFound`: account is not the caller's
/// - `Provider`: the provider call failed; the local row is marked failed
pub async fn create_crypto_payment(
    pool: &DbPool,
    client: &NowPaymentsClient,
    ipn_callback_url: Option<String>,
    user_id: Uuid,
    request: CreateCryptoPaymentRequest,
) -> Result<Payment, AppError> {
    if !client.is_configured() {
        return Err(AppError::NotConfigured("NOWPayments API key"));
    }
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    let pay_currency = normalize_pay_currency(&request.pay_currency)?;

    let account = transaction_service::get_owned_account(pool, user_id, request.account_id).await?;

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (user_id, account_id, provider, amount_cents, currency, pay_currency, status)
        VALUES ($1, $2, 'nowpayments', $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(account.id)
    .bind(request.amount_cents)
    .bind(&account.currency)
    .bind(&pay_currency)
    .bind(PaymentStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;

    let params = CreatePaymentParams {
        price_amount: cents_to_major(payment.amount_cents),
        price_currency: payment.currency.to_ascii_lowercase(),
        pay_currency,
        order_id: payment.id.to_string(),
        order_description: Some(format!("Top-up of account {}", account.account_name)),
        ipn_callback_url,
    };

    let created = match client.create_payment(&params).await {
        Ok(created) => created,
        Err(e) => {
            sqlx::query("UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(PaymentStatus::Failed.as_str())
                .bind(payment.id)
                .execute(pool)
                .await?;
            return Err(e);
        }
    };

    let status = initial_status(&created.payment_status);
    if status == PaymentStatus::Pending && created.payment_status.trim() != "waiting" {
        tracing::warn!(
            payment_id = %payment.id,
            raw_status = %created.payment_status,
            "provider reported an unrecognised status at creation"
        );
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET provider_payment_id = $1,
            pay_address = $2,
            pay_amount = $3,
            status = $4,
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&created.payment_id)
    .bind(created.pay_address)
    .bind(created.pay_amount)
    .bind(status.as_str())
    .bind(payment.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        provider_payment_id = %created.payment_id,
        "crypto payment created"
    );

    Ok(payment)
}

async fn lock_payment(tx: &mut DbTx<'_>, payload: &IpnPayload) -> Result<Payment, AppError> {
    let by_order = match payload.order_id.as_deref().map(Uuid::parse_str) {
        Some(Ok(order_id)) => {
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut **tx)
                .await?
        }
        _ => None,
    };

    if let Some(payment) = by_order {
        return Ok(payment);
    }

    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE provider_payment_id = $1 FOR UPDATE")
        .bind(&payload.payment_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::PaymentNotFound)
}

/// Verify and apply one NOWPayments IPN callback.
///
/// # Errors
///
/// - `NotConfigured`: no IPN secret
/// - `InvalidSignature`: header missing or mismatched
/// - `InvalidRequest`: body is not a valid IPN payload, or the provider id
///   conflicts with the one stored for the order
/// - `PaymentNotFound`: no local payment matches
pub async fn process_ipn(
    pool: &DbPool,
    ipn_secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<IpnOutcome, AppError> {
    let secret = ipn_secret
        .filter(|s| !s.is_empty())
        .ok_or(AppError::NotConfigured("NOWPayments IPN secret"))?;
    let signature = signature.ok_or(AppError::InvalidSignature)?;

    if let Err(e) = nowpayments::verify_ipn_signature(secret, body, signature) {
        tracing::warn!(error = %e, "rejected NOWPayments IPN");
        return Err(e);
    }

    let payload: IpnPayload = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid IPN payload: {e}")))?;
    let reported = PaymentStatus::from_nowpayments(&payload.payment_status);

    let mut tx = pool.begin().await?;

    let payment = lock_payment(&mut tx, &payload).await?;

    if let Some(known) = payment.provider_payment_id.as_deref() {
        if known != payload.payment_id {
            tracing::warn!(
                payment_id = %payment.id,
                known,
                reported = %payload.payment_id,
                "IPN provider id does not match stored payment"
            );
            return Err(AppError::InvalidRequest(
                "Provider payment id mismatch".to_string(),
            ));
        }
    }

    let current = payment.status();
    if !current.can_advance_to(reported) {
        tracing::info!(
            payment_id = %payment.id,
            %current,
            raw_status = %payload.payment_status,
            "IPN status ignored"
        );
        tx.commit().await?;
        return Ok(IpnOutcome {
            ack: IpnAck {
                received: true,
                status: current,
                credited: false,
            },
            payment,
            ledger: None,
        });
    }

    let mut payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = $1,
            provider_payment_id = COALESCE(provider_payment_id, $2),
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(reported.as_str())
    .bind(&payload.payment_id)
    .bind(payment.id)
    .fetch_one(&mut *tx)
    .await?;

    let mut ledger = None;
    if reported == PaymentStatus::Completed && payment.credited_at.is_none() {
        let entry = LedgerEntry::new(payment.account_id, payment.amount_cents)
            .description(format!("Crypto deposit ({})", payment.pay_currency))
            .idempotency_key(format!("nowpayments:{}", payload.payment_id))
            .metadata(json!({
                "payment_id": payment.id,
                "provider_payment_id": payload.payment_id,
                "actually_paid": payload.actually_paid,
            }));
        let outcome = transaction_service::apply_credit(&mut tx, entry).await?;

        payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET credited_at = NOW(),
                transaction_id = $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(outcome.transaction.id)
        .bind(payment.id)
        .fetch_one(&mut *tx)
        .await?;

        ledger = Some(outcome);
    }

    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        status = %reported,
        credited = ledger.is_some(),
        "IPN applied"
    );

    Ok(IpnOutcome {
        ack: IpnAck {
            received: true,
            status: reported,
            credited: ledger.is_some(),
        },
        payment,
        ledger,
    })
}

pub async fn list_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<Payment>, AppError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(payments)
}

pub async fn get_for_user(
    pool: &DbPool,
    user_id: Uuid,
    payment_id: Uuid,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 AND user_id = $2")
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::PaymentNotFound)
}
