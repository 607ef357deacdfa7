use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Per-connection pragmas. Foreign keys are off by default in SQLite and
/// the busy timeout lets concurrent checkouts wait for the writer lock
/// instead of failing with SQLITE_BUSY.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;";

fn manager(database_path: &str) -> SqliteConnectionManager {
    SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.execute_batch(CONNECTION_PRAGMAS)
    })
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and applies the
/// embedded schema migrations on the first connection.
///
/// # Example
///
/// ```no_run
/// use lavka::storage::create_pool;
///
/// let pool = create_pool("lavka.sqlite")?;
/// # Ok::<(), lavka::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager(database_path))?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    log::info!("Database ready at {}", database_path);

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Runs `f` with a pooled connection on the blocking thread pool.
///
/// Used for the stock transactions, which may wait on SQLite's writer
/// lock for up to the busy timeout.
pub async fn with_connection<T, F>(pool: &Arc<DbPool>, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || -> AppResult<T> {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| AppError::Anyhow(anyhow::anyhow!("database task failed: {}", e)))?
}
