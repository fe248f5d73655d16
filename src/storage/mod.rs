//! SQLite storage layer -- connection pool and migrations.

pub mod schema;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
///
/// The pool owns the database exclusively: its single connection runs in
/// `EXCLUSIVE` locking mode and keeps the file lock until the pool is
/// dropped. A second opener on the same path, in this process or another,
/// gets an error instead of silently overwriting the first one's writes.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
        }
    }

    ensure_not_in_use(path)?;

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA busy_timeout = 5000;
                 PRAGMA locking_mode = EXCLUSIVE;
                 PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 BEGIN EXCLUSIVE;
                 COMMIT;",
        )
    });

    let pool = R2D2Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .with_context(|| format!("failed to open database: {path}"))?;

    // Run migrations on a single connection
    {
        let conn = pool.get()?;
        schema::migrate(&conn)?;
    }

    Ok(pool)
}

/// Fail fast when another handle holds the database lock.
fn ensure_not_in_use(path: &str) -> Result<()> {
    let conn = Connection::open(path).with_context(|| format!("failed to open database: {path}"))?;
    conn.busy_timeout(Duration::ZERO)?;
    match conn.execute_batch("BEGIN IMMEDIATE; ROLLBACK;") {
        Ok(()) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            bail!("database {path} is already in use by another tiktrend-actions store")
        }
        Err(e) => Err(e).with_context(|| format!("failed to open database: {path}")),
    }
}

/// Single-connection in-memory database. Every pooled connection to
/// `:memory:` would be a separate database, so the pool is capped at one and
/// the connection is never recycled.
pub fn open_memory_pool() -> Result<Pool> {
    let manager = SqliteConnectionManager::memory();
    let pool = R2D2Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)?;
    {
        let conn = pool.get()?;
        schema::migrate(&conn)?;
    }
    Ok(pool)
}
