//! Account management HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/accounts - Open a new account
//! - GET /api/accounts/{id} - Get account by ID
//! - GET /api/accounts - List all accounts of the caller

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::account::{Account, AccountResponse, CreateAccountRequest, normalize_currency},
    services::transaction_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Open a new account for the caller.
///
/// # Request Body
///
/// ```json
/// {
///   "account_name": "Savings",
///   "currency": "EUR"  // optional, defaults to USD
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created account
/// - **Error (400)**: Empty name or invalid currency code
/// - **Error (401)**: Missing or invalid token
pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account_name = request.account_name.trim();
    if account_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Account name is required".to_string(),
        ));
    }
    let currency = normalize_currency(&request.currency)?;

    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (user_id, account_name, currency)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, currency, account_name) DO NOTHING
        RETURNING *
        "#,
    )
    // Link to authenticated user
    .bind(auth.user_id)
    .bind(account_name)
    .bind(&currency)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "An account named '{account_name}' in {currency} already exists"
        ))
    })?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Get a specific account by ID.
///
/// Returns 404 if the account doesn't exist OR belongs to another user
/// (prevents leaking existence of other accounts).
pub async fn get_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account =
        transaction_service::get_owned_account(&state.pool, auth.user_id, account_id).await?;

    Ok(Json(account.into()))
}

/// List all accounts of the caller, newest first.
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT *
        FROM accounts
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?;

    let responses: Vec<AccountResponse> = accounts.into_iter().map(Into::into).collect();

    Ok(Json(responses))
}
