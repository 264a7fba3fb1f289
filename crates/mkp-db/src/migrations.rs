//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;

use mkp_core::{Error, Result};

/// V1: initial schema -- archive ledger and original-flag snapshots.
const V1_INITIAL: &str = r#"
-- One row per processed file. `fingerprint` is the post-mutation size:mtime
-- identity; `applied_plan` is the serialized plan JSON.
CREATE TABLE archive (
    file_path    TEXT PRIMARY KEY,
    fingerprint  TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending',
    applied_plan TEXT,
    error        TEXT,
    created_at   TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
);

-- First-seen flag state per track, written once and never overwritten.
CREATE TABLE original_flags (
    file_path    TEXT NOT NULL REFERENCES archive(file_path) ON DELETE CASCADE,
    track_uid    INTEGER NOT NULL,
    default_flag INTEGER NOT NULL,
    forced_flag  INTEGER NOT NULL,
    enabled_flag INTEGER NOT NULL,
    PRIMARY KEY (file_path, track_uid)
);

CREATE INDEX idx_archive_status ON archive(status);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::archive(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::archive(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::archive(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::archive(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::archive(e.to_string()))?;

        tx.commit().map_err(|e| Error::archive(e.to_string()))?;
    }

    Ok(())
}
