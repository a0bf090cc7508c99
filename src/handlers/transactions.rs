//! Transaction HTTP handlers.
//!
//! This module implements transaction-related API endpoints:
//! - GET /api/transactions - Caller's transactions, newest first
//! - GET /api/transactions/{id} - Get transaction details
//! - POST /api/transactions/transfer - Move money from one of the caller's accounts
//! - POST /api/admin/accounts/{id}/credit - Admin manual credit
//! - POST /api/admin/accounts/{id}/debit - Admin manual debit

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::transaction::{
        AdjustmentRequest, LedgerEntry, ListQuery, TransactionResponse, TransferRequest,
        client_idempotency_key,
    },
    services::transaction_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::json;
use uuid::Uuid;

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions = transaction_service::list_for_user(
        &state.pool,
        auth.user_id,
        query.limit(),
        query.offset(),
    )
    .await?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// Get transaction by ID.
///
/// Returns 404 unless the transaction touches one of the caller's accounts.
pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction =
        transaction_service::get_for_user(&state.pool, auth.user_id, transaction_id).await?;

    Ok(Json(transaction.into()))
}

/// Transfer money between accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "from_account_id": "550e8400-...",
///   "to_account_id": "660e8400-...",
///   "amount_cents": 25000,
///   "description": "Rent share",
///   "idempotency_key": "rent-2025-12"
/// }
/// ```
///
/// # Validation
///
/// - Source account must belong to the caller
/// - Source must have sufficient balance
/// - Accounts must be different and share a currency
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    // Verify source account ownership; destination may belong to anyone
    transaction_service::get_owned_account(&state.pool, auth.user_id, request.from_account_id)
        .await?;

    let outcome = transaction_service::execute_transfer(
        &state.pool,
        request.from_account_id,
        request.to_account_id,
        request.amount_cents,
        request.description,
        client_idempotency_key("transfer", auth.user_id, request.idempotency_key.as_deref()),
    )
    .await?;

    state.notifier.publish_ledger(&outcome);

    Ok((StatusCode::CREATED, Json(outcome.transaction.into())))
}

fn adjustment_entry(
    account_id: Uuid,
    admin: &AuthContext,
    request: AdjustmentRequest,
    kind: &str,
) -> LedgerEntry {
    let mut entry = LedgerEntry::new(account_id, request.amount_cents)
        .description(
            request
                .description
                .unwrap_or_else(|| format!("Manual {kind} by admin")),
        )
        .metadata(json!({ "adjusted_by": admin.user_id, "kind": kind }));
    if let Some(key) =
        client_idempotency_key("adjust", account_id, request.idempotency_key.as_deref())
    {
        entry = entry.idempotency_key(key);
    }
    entry
}

/// Admin manual credit.
pub async fn admin_credit(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let entry = adjustment_entry(account_id, &admin, request, "credit");
    let outcome = transaction_service::execute_credit(&state.pool, entry).await?;

    tracing::info!(%account_id, admin_id = %admin.user_id, amount_cents = outcome.transaction.amount_cents, "admin credit");
    state.notifier.publish_ledger(&outcome);

    Ok((StatusCode::CREATED, Json(outcome.transaction.into())))
}

/// Admin manual debit.
pub async fn admin_debit(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let entry = adjustment_entry(account_id, &admin, request, "debit");
    let outcome = transaction_service::execute_debit(&state.pool, entry).await?;

    tracing::info!(%account_id, admin_id = %admin.user_id, amount_cents = outcome.transaction.amount_cents, "admin debit");
    state.notifier.publish_ledger(&outcome);

    Ok((StatusCode::CREATED, Json(outcome.transaction.into())))
}
