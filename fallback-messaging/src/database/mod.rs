//! Database module.
//!
//! Persistence layer using SQLite with sqlx: connection pool setup, schema
//! migrations, row models and repositories for delivery records, WhatsApp
//! id mappings and the fallback delay queue.

pub mod models;
pub mod repositories;
pub mod time;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Default connection pool size.
const DEFAULT_POOL_SIZE: u32 = 10;

/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Default cache size (negative value means KiB, so this is ~16MB).
const DEFAULT_CACHE_SIZE_KB: i32 = -16000;

/// Default WAL auto-checkpoint threshold in pages.
const DEFAULT_WAL_AUTOCHECKPOINT_PAGES: i32 = 1000;

async fn apply_per_connection_pragmas(
    conn: &mut sqlx::SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "PRAGMA wal_autocheckpoint = {}",
        DEFAULT_WAL_AUTOCHECKPOINT_PAGES
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!("PRAGMA cache_size = {}", DEFAULT_CACHE_SIZE_KB))
        .execute(&mut *conn)
        .await?;

    sqlx::query("PRAGMA temp_store = MEMORY")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn ensure_wal_mode(pool: &DbPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    let row = sqlx::query("PRAGMA journal_mode")
        .fetch_one(&mut *conn)
        .await?;
    let mode: String = row.get(0);
    if mode != "wal" && mode != "memory" {
        tracing::warn!("journal_mode was '{}', expected 'wal'; re-setting", mode);
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Compute a default pool size based on available CPU cores.
pub fn default_pool_size() -> u32 {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(2);
    (cores * 2).min(DEFAULT_POOL_SIZE)
}

/// Initialize the database connection pool with WAL mode.
///
/// # Arguments
/// * `database_url` - SQLite database URL (e.g., "sqlite:fallback.db?mode=rwc")
/// * `max_connections` - Maximum number of connections in the pool
pub async fn init_pool_with_size(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(database_url)?
        // Concurrent reads while the evaluator and normalizers write
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .after_connect(|conn, _meta| {
            Box::pin(async move { apply_per_connection_pragmas(&mut *conn).await })
        })
        .connect_with(connect_options)
        .await?;

    ensure_wal_mode(&pool).await?;

    tracing::info!(
        "Database pool initialized with WAL mode, {} max connections",
        max_connections
    );

    Ok(pool)
}

/// Initialize the database connection pool with default size.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    init_pool_with_size(database_url, default_pool_size()).await
}

pub async fn run_migrations(pool: &DbPool) -> crate::Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Single-connection in-memory pool with the schema applied.
///
/// A `sqlite::memory:` database lives per connection, so tests must never
/// let the pool open a second one.
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
