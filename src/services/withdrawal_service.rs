//! Withdrawal workflow: request, admin review, payout bookkeeping.
//!
//! Every transition locks the withdrawal row `FOR UPDATE` and validates the
//! move against [`WithdrawalStatus`], so two admins acting on the same
//! request cannot both succeed. Approval debits the account in the same
//! database transaction that flips the status.

use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        transaction::LedgerEntry,
        withdrawal::{
            CreateWithdrawalRequest, Withdrawal, WithdrawalStatus, WithdrawalWithUser,
        },
    },
    services::transaction_service::{self, LedgerOutcome},
};

const MAX_DESTINATION_LEN: usize = 256;

/// Create a PENDING withdrawal request.
///
/// # Validation
///
/// - Amount must be positive
/// - Destination must be non-empty and at most 256 characters
/// - Account must belong to the caller
/// - Balance minus already-pending withdrawals must cover the amount
pub async fn request_withdrawal(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateWithdrawalRequest,
) -> Result<Withdrawal, AppError> {
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let destination = request.destination.trim();
    if destination.is_empty() || destination.chars().count() > MAX_DESTINATION_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Destination must be 1-{MAX_DESTINATION_LEN} characters"
        )));
    }

    let account = transaction_service::get_owned_account(pool, user_id, request.account_id).await?;

    let pending_cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM withdrawals WHERE account_id = $1 AND status = 'PENDING'",
    )
    .bind(account.id)
    .fetch_one(pool)
    .await?;

    if account.balance_cents - pending_cents < request.amount_cents {
        return Err(AppError::InsufficientBalance);
    }

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals (user_id, account_id, amount_cents, currency, method, destination)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(account.id)
    .bind(request.amount_cents)
    .bind(&account.currency)
    .bind(request.method.as_str())
    .bind(destination)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        withdrawal_id = %withdrawal.id,
        %user_id,
        amount_cents = withdrawal.amount_cents,
        "withdrawal requested"
    );

    Ok(withdrawal)
}

pub async fn list_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<Withdrawal>, AppError> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(withdrawals)
}

pub async fn get_for_user(
    pool: &DbPool,
    user_id: Uuid,
    withdrawal_id: Uuid,
) -> Result<Withdrawal, AppError> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 AND user_id = $2")
        .bind(withdrawal_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::WithdrawalNotFound)
}

pub async fn get_by_id(pool: &DbPool, withdrawal_id: Uuid) -> Result<Withdrawal, AppError> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1")
        .bind(withdrawal_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::WithdrawalNotFound)
}

/// Admin review queue, oldest first, with requester email and trust score.
pub async fn list_all(
    pool: &DbPool,
    status: Option<WithdrawalStatus>,
) -> Result<Vec<WithdrawalWithUser>, AppError> {
    let rows = sqlx::query_as::<_, WithdrawalWithUser>(
        r#"
        SELECT w.*, u.email AS user_email, u.trust_score AS user_trust_score
        FROM withdrawals w
        JOIN users u ON u.id = w.user_id
        WHERE ($1::TEXT IS NULL OR w.status = $1)
        ORDER BY w.created_at ASC
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn lock_withdrawal(tx: &mut DbTx<'_>, withdrawal_id: Uuid) -> Result<Withdrawal, AppError> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
        .bind(withdrawal_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::WithdrawalNotFound)
}

/// Approve a PENDING withdrawal and debit the account.
///
/// # Errors
///
/// - `WithdrawalNotFound`
/// - `InvalidStatusTransition`: not PENDING
/// - `InsufficientBalance`: the account no longer covers the amount; the
///   withdrawal stays PENDING
pub async fn approve(
    pool: &DbPool,
    admin_id: Uuid,
    withdrawal_id: Uuid,
    notes: Option<String>,
) -> Result<(Withdrawal, LedgerOutcome), AppError> {
    let mut tx = pool.begin().await?;

    let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;
    let next = withdrawal.status()?.transition(WithdrawalStatus::Approved)?;

    let entry = LedgerEntry::new(withdrawal.account_id, withdrawal.amount_cents)
        .description(format!("Withdrawal {} via {}", withdrawal.id, withdrawal.method))
        .idempotency_key(format!("withdrawal:{}", withdrawal.id))
        .metadata(json!({ "withdrawal_id": withdrawal.id }));
    let outcome = transaction_service::apply_debit(&mut tx, entry).await?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET status = $1,
            reviewed_by = $2,
            reviewed_at = NOW(),
            admin_notes = $3,
            transaction_id = $4,
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(next.as_str())
    .bind(admin_id)
    .bind(notes)
    .bind(outcome.transaction.id)
    .bind(withdrawal.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%withdrawal_id, %admin_id, "withdrawal approved");

    Ok((withdrawal, outcome))
}

/// Reject a PENDING withdrawal. No money moves.
pub async fn reject(
    pool: &DbPool,
    admin_id: Uuid,
    withdrawal_id: Uuid,
    reason: &str,
) -> Result<Withdrawal, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::InvalidRequest(
            "A rejection reason is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;
    let next = withdrawal.status()?.transition(WithdrawalStatus::Rejected)?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET status = $1,
            reviewed_by = $2,
            reviewed_at = NOW(),
            admin_notes = $3,
            updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(next.as_str())
    .bind(admin_id)
    .bind(reason)
    .bind(withdrawal.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%withdrawal_id, %admin_id, "withdrawal rejected");

    Ok(withdrawal)
}

/// Record that an APPROVED withdrawal was paid out.
pub async fn mark_processed(
    pool: &DbPool,
    admin_id: Uuid,
    withdrawal_id: Uuid,
    external_reference: Option<String>,
) -> Result<Withdrawal, AppError> {
    let external_reference = external_reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let mut tx = pool.begin().await?;

    let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;
    let next = withdrawal.status()?.transition(WithdrawalStatus::Processed)?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET status = $1,
            processed_at = NOW(),
            external_reference = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(next.as_str())
    .bind(external_reference)
    .bind(withdrawal.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%withdrawal_id, %admin_id, "withdrawal processed");

    Ok(withdrawal)
}
