//! Crypto payment handlers.
//!
//! - POST /api/payments/crypto - Start a NOWPayments top-up
//! - POST /api/payments/ipn/nowpayments - Provider callback (public, signed)
//! - GET /api/payments - Caller's payments
//! - GET /api/payments/{id} - One of the caller's payments

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::payment::{CreateCryptoPaymentRequest, IpnAck, PaymentResponse},
    services::{nowpayments::SIGNATURE_HEADER, payment_service},
    state::AppState,
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

/// Start a crypto top-up.
///
/// # Response
///
/// - **Success (201 Created)**: Payment with the provider's pay address and amount
/// - **Error (502)**: NOWPayments rejected or did not answer
/// - **Error (503)**: No NOWPayments API key configured
pub async fn create_crypto_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCryptoPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let payment = payment_service::create_crypto_payment(
        &state.pool,
        &state.nowpayments,
        state.config.ipn_callback_url.clone(),
        auth.user_id,
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// NOWPayments IPN callback.
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes and parsed only after the `x-nowpayments-sig` check passes.
///
/// # Response
///
/// ```json
/// { "received": true, "status": "completed", "credited": true }
/// ```
pub async fn nowpayments_ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IpnAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payment_service::process_ipn(
        &state.pool,
        state.config.nowpayments_ipn_secret.as_deref(),
        signature,
        &body,
    )
    .await?;

    if let Some(ledger) = &outcome.ledger {
        state.notifier.publish_ledger(ledger);
    }

    Ok(Json(outcome.ack))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = payment_service::list_for_user(&state.pool, auth.user_id).await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = payment_service::get_for_user(&state.pool, auth.user_id, payment_id).await?;

    Ok(Json(payment.into()))
}
