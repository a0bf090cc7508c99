//! Router assembly.
//!
//! Three groups share one [`AppState`]:
//! - public: health, registration, login, the signed IPN callback, WebSocket
//! - user: everything behind a valid bearer token
//! - admin: user routes that additionally require the `ADMIN` role

use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers::{
        accounts, admin, auth, health, notifications, payments, transactions, withdrawals,
    },
    middleware::auth::{auth_middleware, require_admin},
    state::AppState,
};

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match config
        .frontend_url
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
    {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/payments/ipn/nowpayments",
            post(payments::nowpayments_ipn),
        )
        .route("/api/ws", get(notifications::ws_handler));

    let user_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        // Accounts
        .route(
            "/api/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/api/accounts/{id}", get(accounts::get_account))
        // Ledger
        .route("/api/transactions", get(transactions::list_transactions))
        .route(
            "/api/transactions/transfer",
            post(transactions::create_transfer),
        )
        .route("/api/transactions/{id}", get(transactions::get_transaction))
        // Withdrawals
        .route(
            "/api/withdrawals",
            get(withdrawals::list_withdrawals).post(withdrawals::create_withdrawal),
        )
        .route("/api/withdrawals/{id}", get(withdrawals::get_withdrawal))
        // Payments
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/crypto", post(payments::create_crypto_payment))
        .route("/api/payments/{id}", get(payments::get_payment))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Layers run outside-in: authenticate first, then check the role
    let admin_routes = Router::new()
        .route(
            "/api/withdrawals/{id}/approve",
            post(withdrawals::approve_withdrawal),
        )
        .route(
            "/api/withdrawals/{id}/reject",
            post(withdrawals::reject_withdrawal),
        )
        .route(
            "/api/withdrawals/{id}/process",
            post(withdrawals::process_withdrawal),
        )
        .route(
            "/api/admin/withdrawals",
            get(withdrawals::list_all_withdrawals),
        )
        .route(
            "/api/admin/withdrawals/{id}/ai-review",
            post(admin::ai_review_withdrawal),
        )
        .route(
            "/api/admin/accounts/{id}/credit",
            post(transactions::admin_credit),
        )
        .route(
            "/api/admin/accounts/{id}/debit",
            post(transactions::admin_debit),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/notifications/booking",
            post(admin::notify_booking),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
