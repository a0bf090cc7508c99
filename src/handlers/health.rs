//! `GET /health`: liveness plus a database round trip.

use crate::{error::AppError, state::AppState};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    /// Open WebSocket subscriptions
    pub live_connections: usize,
    pub timestamp: DateTime<Utc>,
}

/// ```json
/// {
///   "status": "ok",
///   "database": "connected",
///   "version": "0.1.0",
///   "live_connections": 3,
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// An unreachable database surfaces as the standard 500 error body.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&state.pool).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
        live_connections: state.notifier.subscriber_count(),
        timestamp: Utc::now(),
    }))
}
