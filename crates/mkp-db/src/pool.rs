//! SQLite connection pooling for the archive.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use mkp_core::{Error, Result};

use crate::migrations;

/// Archive writes are serialized upstream by the per-file locks, so the
/// pool mostly serves concurrent short-circuit reads from scan workers. A
/// handful of connections is plenty.
const POOL_SIZE: u32 = 4;

/// How long a connection waits on a locked database before giving up.
/// Covers WAL checkpoints racing a scan burst.
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open (or create) the archive database at `db_path` and run pending
/// migrations.
///
/// Every connection enforces foreign keys and uses WAL journaling with
/// `synchronous = NORMAL`; the archive can always be rebuilt by a rescan,
/// so losing the last transaction on power failure is an acceptable trade
/// for not fsyncing on every flag update.
pub fn init_pool(db_path: &Path) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};",
        ))
    });

    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::archive(format!("cannot open archive pool: {e}")))?;

    migrations::run_migrations(&*get_conn(&pool)?)?;

    Ok(pool)
}

/// Open a throwaway in-memory archive, used by tests.
///
/// Each call gets a uniquely named shared-cache database: connections
/// within one pool see the same data, parallel tests never collide.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:mkp_archive_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::archive(format!("cannot open in-memory archive: {e}")))?;

    migrations::run_migrations(&*get_conn(&pool)?)?;

    Ok(pool)
}

/// Check out a connection, mapping pool exhaustion to an archive error.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::archive(format!("archive connection unavailable: {e}")))
}
