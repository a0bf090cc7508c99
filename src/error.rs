//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing/invalid tokens, bad credentials, bad IPN signatures
/// - **Authorization Errors**: Authenticated caller lacks the required role
/// - **Resource Errors**: Requested resources not found
/// - **Business Logic Errors**: Operations that violate ledger or workflow rules
/// - **Provider Errors**: Outbound payment/AI provider failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bearer token is missing, malformed, expired or signed with another key.
    #[error("Authentication required")]
    Unauthorized,

    /// Email/password pair did not match an account.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Payment provider callback signature did not verify.
    #[error("Invalid payment callback signature")]
    InvalidSignature,

    /// Caller is authenticated but not allowed to perform the operation.
    #[error("Insufficient permissions")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    /// Requested account does not exist or doesn't belong to the caller.
    #[error("Account not found")]
    AccountNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Withdrawal not found")]
    WithdrawalNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    /// Registration with an email that already has a user.
    #[error("Email is already registered")]
    EmailTaken,

    /// Withdrawal workflow transition that the status machine does not allow.
    #[error("Cannot move withdrawal from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Idempotency key already recorded for a different movement.
    #[error("Idempotency key was already used for a different transaction")]
    IdempotencyConflict,

    /// Account has insufficient balance for the requested operation.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// An optional integration is used without its configuration.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Outbound provider returned an error or could not be reached.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Forbidden => "forbidden",
            AppError::UserNotFound => "user_not_found",
            AppError::AccountNotFound => "account_not_found",
            AppError::TransactionNotFound => "transaction_not_found",
            AppError::WithdrawalNotFound => "withdrawal_not_found",
            AppError::PaymentNotFound => "payment_not_found",
            AppError::EmailTaken => "email_taken",
            AppError::InvalidStatusTransition { .. } => "invalid_status_transition",
            AppError::IdempotencyConflict => "idempotency_conflict",
            AppError::InsufficientBalance => "insufficient_balance",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::NotConfigured(_) => "not_configured",
            AppError::Provider(_) => "provider_error",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized | AppError::InvalidCredentials | AppError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound
            | AppError::AccountNotFound
            | AppError::TransactionNotFound
            | AppError::WithdrawalNotFound
            | AppError::PaymentNotFound => StatusCode::NOT_FOUND,
            AppError::EmailTaken
            | AppError::InvalidStatusTransition { .. }
            | AppError::IdempotencyConflict => StatusCode::CONFLICT,
            AppError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Database and internal errors hide their details from the client and are
/// logged instead.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "An internal error occurred".to_string()
            }
            AppError::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_conflict() {
        let err = AppError::InvalidStatusTransition {
            from: "REJECTED".into(),
            to: "APPROVED".into(),
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "invalid_status_transition");
        assert_eq!(err.to_string(), "Cannot move withdrawal from REJECTED to APPROVED");

        assert_eq!(AppError::IdempotencyConflict.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::IdempotencyConflict.code(), "idempotency_conflict");
    }

    #[test]
    fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        for err in [
            AppError::Unauthorized,
            AppError::InvalidCredentials,
            AppError::InvalidSignature,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
