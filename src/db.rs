//! PostgreSQL pool, transaction alias and embedded migrations.

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

pub type DbPool = Pool<Postgres>;

/// Open database transaction.
///
/// Ledger primitives take one of these so callers can compose several
/// balance movements and status updates into a single atomic unit.
pub type DbTx<'a> = sqlx::Transaction<'a, Postgres>;

/// Connect a pool of at most `max_connections` connections.
///
/// # Errors
///
/// Fails when the URL is malformed or the server cannot be reached within
/// the acquire timeout.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Apply the SQL files under `migrations/`, embedded at compile time.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
