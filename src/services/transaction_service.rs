//! Transaction service - Core ledger logic for balance movements.
//!
//! This service handles:
//! - Atomic balance updates
//! - Idempotency checking
//! - Balance validation
//! - Database transaction management
//!
//! # Atomicity Guarantees
//!
//! All balance updates happen within PostgreSQL transactions with the
//! account rows locked `FOR UPDATE`. `apply_credit` and `apply_debit` run
//! inside a caller-supplied transaction so withdrawals and payments can
//! update their own rows in the same atomic unit.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::{DbPool, DbTx},
    error::AppError,
    models::{
        account::Account,
        transaction::{LedgerEntry, Transaction},
    },
};

/// Result of a ledger movement.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub transaction: Transaction,

    /// Accounts whose balance changed, as they are after the movement.
    ///
    /// Empty when the idempotency key was replayed.
    pub accounts: Vec<Account>,

    /// True when an earlier transaction with the same idempotency key was returned.
    pub replayed: bool,
}

impl LedgerOutcome {
    fn replayed(transaction: Transaction) -> Self {
        Self {
            transaction,
            accounts: Vec::new(),
            replayed: true,
        }
    }
}

fn validate_amount(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

async fn find_by_idempotency_key(
    conn: &mut PgConnection,
    key: Option<&str>,
) -> Result<Option<Transaction>, AppError> {
    let Some(key) = key else {
        return Ok(None);
    };

    let existing =
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(conn)
            .await?;

    Ok(existing)
}

/// Honour a replayed key only for the same movement.
fn replay(
    existing: Transaction,
    transaction_type: &str,
    from_account_id: Option<Uuid>,
    to_account_id: Option<Uuid>,
    amount_cents: i64,
) -> Result<LedgerOutcome, AppError> {
    if !existing.is_same_movement(transaction_type, from_account_id, to_account_id, amount_cents) {
        tracing::warn!(
            transaction_id = %existing.id,
            stored_type = %existing.transaction_type,
            requested_type = transaction_type,
            "idempotency key reused for a different movement"
        );
        return Err(AppError::IdempotencyConflict);
    }
    Ok(LedgerOutcome::replayed(existing))
}

async fn lock_account(tx: &mut DbTx<'_>, account_id: Uuid) -> Result<Account, AppError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::AccountNotFound)
}

async fn adjust_balance(
    tx: &mut DbTx<'_>,
    account_id: Uuid,
    delta_cents: i64,
) -> Result<Account, AppError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET balance_cents = balance_cents + $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(delta_cents)
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(account)
}

/// Add money to an account inside an open transaction.
///
/// # Errors
///
/// - `InvalidRequest`: Amount is zero or negative
/// - `AccountNotFound`: Account doesn't exist
/// - `IdempotencyConflict`: key already recorded for another movement
/// - `Database`: Database error occurred
pub async fn apply_credit(tx: &mut DbTx<'_>, entry: LedgerEntry) -> Result<LedgerOutcome, AppError> {
    validate_amount(entry.amount_cents)?;

    if let Some(existing) =
        find_by_idempotency_key(&mut **tx, entry.idempotency_key.as_deref()).await?
    {
        return replay(existing, "credit", None, Some(entry.account_id), entry.amount_cents);
    }

    let account = lock_account(tx, entry.account_id).await?;
    let account = adjust_balance(tx, account.id, entry.amount_cents).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            transaction_type,
            to_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status,
            metadata
        )
        VALUES ('credit', $1, $2, $3, $4, $5, 'completed', $6)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(entry.amount_cents)
    .bind(&account.currency)
    .bind(entry.description)
    .bind(entry.idempotency_key)
    .bind(entry.metadata)
    .fetch_one(&mut **tx)
    .await?;

    Ok(LedgerOutcome {
        transaction,
        accounts: vec![account],
        replayed: false,
    })
}

/// Remove money from an account inside an open transaction.
///
/// # Errors
///
/// - `InsufficientBalance`: balance would go below zero
/// - plus everything [`apply_credit`] returns
pub async fn apply_debit(tx: &mut DbTx<'_>, entry: LedgerEntry) -> Result<LedgerOutcome, AppError> {
    validate_amount(entry.amount_cents)?;

    if let Some(existing) =
        find_by_idempotency_key(&mut **tx, entry.idempotency_key.as_deref()).await?
    {
        return replay(existing, "debit", Some(entry.account_id), None, entry.amount_cents);
    }

    let account = lock_account(tx, entry.account_id).await?;

    if account.balance_cents < entry.amount_cents {
        return Err(AppError::InsufficientBalance);
    }

    let account = adjust_balance(tx, account.id, -entry.amount_cents).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            transaction_type,
            from_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status,
            metadata
        )
        VALUES ('debit', $1, $2, $3, $4, $5, 'completed', $6)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(entry.amount_cents)
    .bind(&account.currency)
    .bind(entry.description)
    .bind(entry.idempotency_key)
    .bind(entry.metadata)
    .fetch_one(&mut **tx)
    .await?;

    Ok(LedgerOutcome {
        transaction,
        accounts: vec![account],
        replayed: false,
    })
}

/// Execute a standalone credit in its own database transaction.
pub async fn execute_credit(pool: &DbPool, entry: LedgerEntry) -> Result<LedgerOutcome, AppError> {
    let mut tx = pool.begin().await?;
    let outcome = apply_credit(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Execute a standalone debit in its own database transaction.
///
/// On any error the transaction is dropped and rolled back.
pub async fn execute_debit(pool: &DbPool, entry: LedgerEntry) -> Result<LedgerOutcome, AppError> {
    let mut tx = pool.begin().await?;
    let outcome = apply_debit(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Execute a transfer transaction (move money between accounts).
///
/// Both account rows are locked in id order so two opposite transfers
/// between the same pair cannot deadlock.
pub async fn execute_transfer(
    pool: &DbPool,
    from_account_id: Uuid,
    to_account_id: Uuid,
    amount_cents: i64,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<LedgerOutcome, AppError> {
    validate_amount(amount_cents)?;

    if from_account_id == to_account_id {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to same account".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    if let Some(existing) = find_by_idempotency_key(&mut *tx, idempotency_key.as_deref()).await? {
        return replay(
            existing,
            "transfer",
            Some(from_account_id),
            Some(to_account_id),
            amount_cents,
        );
    }

    let locked = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(vec![from_account_id, to_account_id])
    .fetch_all(&mut *tx)
    .await?;

    let from = locked
        .iter()
        .find(|a| a.id == from_account_id)
        .ok_or(AppError::AccountNotFound)?;
    let to = locked
        .iter()
        .find(|a| a.id == to_account_id)
        .ok_or(AppError::AccountNotFound)?;

    if from.currency != to.currency {
        return Err(AppError::InvalidRequest(format!(
            "Currency mismatch: {} -> {}",
            from.currency, to.currency
        )));
    }

    if from.balance_cents < amount_cents {
        return Err(AppError::InsufficientBalance);
    }

    let currency = from.currency.clone();
    let from = adjust_balance(&mut tx, from_account_id, -amount_cents).await?;
    let to = adjust_balance(&mut tx, to_account_id, amount_cents).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            transaction_type,
            from_account_id,
            to_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status
        )
        VALUES ('transfer', $1, $2, $3, $4, $5, $6, 'completed')
        RETURNING *
        "#,
    )
    .bind(from_account_id)
    .bind(to_account_id)
    .bind(amount_cents)
    .bind(currency)
    .bind(description)
    .bind(idempotency_key)
    .fetch_one(&mut *tx)
    .await?;

    // Commit ALL changes atomically
    tx.commit().await?;

    Ok(LedgerOutcome {
        transaction,
        accounts: vec![from, to],
        replayed: false,
    })
}

/// List transactions touching any of the user's accounts, newest first.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT t.*
        FROM transactions t
        WHERE EXISTS (
            SELECT 1 FROM accounts a
            WHERE a.user_id = $1
            AND (a.id = t.from_account_id OR a.id = t.to_account_id)
        )
        ORDER BY t.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

/// Get a transaction the user can see (it touches one of their accounts).
pub async fn get_for_user(
    pool: &DbPool,
    user_id: Uuid,
    transaction_id: Uuid,
) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT t.*
        FROM transactions t
        WHERE t.id = $1
        AND EXISTS (
            SELECT 1 FROM accounts a
            WHERE a.user_id = $2
            AND (a.id = t.from_account_id OR a.id = t.to_account_id)
        )
        "#,
    )
    .bind(transaction_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::TransactionNotFound)
}

/// Get an account owned by the user.
pub async fn get_owned_account(
    pool: &DbPool,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<Account, AppError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND user_id = $2")
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::AccountNotFound)
}
