//! Withdrawal HTTP handlers.
//!
//! User endpoints:
//! - POST /api/withdrawals - Request a withdrawal
//! - GET /api/withdrawals - Caller's withdrawals
//! - GET /api/withdrawals/{id} - One of the caller's withdrawals
//!
//! Admin endpoints (behind `require_admin`):
//! - POST /api/withdrawals/{id}/approve
//! - POST /api/withdrawals/{id}/reject
//! - POST /api/withdrawals/{id}/process
//! - GET /api/admin/withdrawals?status=PENDING

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::withdrawal::{
        AdminWithdrawalResponse, ApproveWithdrawalRequest, CreateWithdrawalRequest,
        ProcessWithdrawalRequest, RejectWithdrawalRequest, WithdrawalFilter, WithdrawalResponse,
        WithdrawalStatus,
    },
    services::withdrawal_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Request a withdrawal from one of the caller's accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": "550e8400-...",
///   "amount_cents": 25000,
///   "method": "crypto",
///   "destination": "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The PENDING withdrawal
/// - **Error (400)**: Invalid amount or destination
/// - **Error (404)**: Account not owned by caller
/// - **Error (422)**: Balance (minus pending withdrawals) too low
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), AppError> {
    let withdrawal = withdrawal_service::request_withdrawal(&state.pool, auth.user_id, request).await?;

    state.notifier.publish_withdrawal(&withdrawal);

    Ok((StatusCode::CREATED, Json(withdrawal.into())))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WithdrawalResponse>>, AppError> {
    let withdrawals = withdrawal_service::list_for_user(&state.pool, auth.user_id).await?;

    Ok(Json(withdrawals.into_iter().map(Into::into).collect()))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(withdrawal_id): Path<Uuid>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal =
        withdrawal_service::get_for_user(&state.pool, auth.user_id, withdrawal_id).await?;

    Ok(Json(withdrawal.into()))
}

/// Approve a PENDING withdrawal and debit the account.
///
/// The body is optional; `{"notes": "..."}` is stored as admin notes.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Path(withdrawal_id): Path<Uuid>,
    request: Option<Json<ApproveWithdrawalRequest>>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();

    let (withdrawal, ledger) =
        withdrawal_service::approve(&state.pool, admin.user_id, withdrawal_id, request.notes)
            .await?;

    state.notifier.publish_ledger(&ledger);
    state.notifier.publish_withdrawal(&withdrawal);

    Ok(Json(withdrawal.into()))
}

/// Reject a PENDING withdrawal. A non-empty `reason` is required.
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Path(withdrawal_id): Path<Uuid>,
    Json(request): Json<RejectWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal =
        withdrawal_service::reject(&state.pool, admin.user_id, withdrawal_id, &request.reason)
            .await?;

    state.notifier.publish_withdrawal(&withdrawal);

    Ok(Json(withdrawal.into()))
}

/// Mark an APPROVED withdrawal as paid out.
pub async fn process_withdrawal(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Path(withdrawal_id): Path<Uuid>,
    request: Option<Json<ProcessWithdrawalRequest>>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();

    let withdrawal = withdrawal_service::mark_processed(
        &state.pool,
        admin.user_id,
        withdrawal_id,
        request.external_reference,
    )
    .await?;

    state.notifier.publish_withdrawal(&withdrawal);

    Ok(Json(withdrawal.into()))
}

/// Review queue, oldest first. `status` filters by exact status name.
pub async fn list_all_withdrawals(
    State(state): State<AppState>,
    Query(filter): Query<WithdrawalFilter>,
) -> Result<Json<Vec<AdminWithdrawalResponse>>, AppError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<WithdrawalStatus>)
        .transpose()?;

    let rows = withdrawal_service::list_all(&state.pool, status).await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
