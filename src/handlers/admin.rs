//! Admin-only endpoints that do not belong to a single resource module.
//!
//! All routes here sit behind `auth_middleware` and `require_admin`.

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        notification::{BookingNotificationRequest, NotificationEvent},
        user::UserResponse,
    },
    services::{
        ai_service::{self, AiReviewResponse},
        auth_service,
    },
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

/// All users, newest first.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = auth_service::list_users(&state.pool).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Push a `booking_update` event to one user.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "550e8400-...",
///   "booking_id": "660e8400-...",
///   "status": "confirmed",
///   "message": "See you Tuesday"
/// }
/// ```
pub async fn notify_booking(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthContext>,
    Json(request): Json<BookingNotificationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let status = request.status.trim();
    if status.is_empty() {
        return Err(AppError::InvalidRequest(
            "Booking status is required".to_string(),
        ));
    }

    // Unknown users are a 404 rather than a silently dropped event
    auth_service::get_user(&state.pool, request.user_id).await?;

    state.notifier.publish(
        request.user_id,
        NotificationEvent::BookingUpdate {
            booking_id: request.booking_id,
            status: status.to_string(),
            message: request.message,
        },
    );

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %request.user_id,
        booking_id = %request.booking_id,
        "booking notification published"
    );

    Ok((StatusCode::ACCEPTED, Json(json!({ "published": true }))))
}

/// Ask the configured model for a risk summary of a withdrawal.
pub async fn ai_review_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> Result<Json<AiReviewResponse>, AppError> {
    let review = ai_service::review_withdrawal(&state.pool, &state.ai, withdrawal_id).await?;

    Ok(Json(review))
}
