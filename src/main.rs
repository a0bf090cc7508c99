//! Advancia Pay Ledger - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables (and `.env`)
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Seed the admin user when `ADMIN_EMAIL`/`ADMIN_PASSWORD` are set
//! 5. Build HTTP router and start server on configured port

use advancia_ledger::{config::Config, db, routes, services::auth_service, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    if let Some((email, password)) = config.admin_credentials() {
        let admin = auth_service::ensure_admin(&pool, email, password).await?;
        tracing::info!(admin_id = %admin.id, "Admin user ready");
    }

    if config.nowpayments_ipn_secret.is_none() {
        tracing::warn!("NOWPAYMENTS_IPN_SECRET not set; IPN callbacks will be refused");
    }

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(pool, config)?;
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
