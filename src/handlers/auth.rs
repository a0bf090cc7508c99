//! Authentication HTTP handlers.
//!
//! - POST /api/auth/register - Create a user and default account
//! - POST /api/auth/login - Exchange credentials for a session token
//! - GET /api/auth/me - Current user profile

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{AuthResponse, LoginRequest, RegisterRequest, UserResponse},
    services::auth_service,
    state::AppState,
};

/// Register a new user.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "jane@example.com",
///   "password": "correct horse battery",
///   "full_name": "Jane Doe"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: token + user
/// - **400**: invalid email or password shorter than 8 characters
/// - **409**: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = auth_service::register(
        &state.pool,
        request,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email + password.
///
/// # Response
///
/// - **200 OK**: token + user
/// - **401**: unknown email or wrong password
/// - **403**: account deactivated
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = auth_service::login(
        &state.pool,
        request,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )
    .await?;

    Ok(Json(response))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth_service::get_user(&state.pool, auth.user_id).await?;

    Ok(Json(user.into()))
}
