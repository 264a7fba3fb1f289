//! Queries for the archive ledger and original-flag snapshots.

use rusqlite::{params, Connection, OptionalExtension};

use mkp_core::{Error, Fingerprint, Result};
use mkp_engine::FlagPlan;

use crate::models::{ArchiveEntry, ArchiveStatus, OriginalFlags};

const SELECT_COLUMNS: &str =
    "file_path, fingerprint, status, applied_plan, error, created_at, updated_at";

/// Look up the archive entry for `path`, if any.
pub fn lookup(conn: &Connection, path: &str) -> Result<Option<ArchiveEntry>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM archive WHERE file_path = ?1"),
        [path],
        ArchiveEntry::from_row,
    )
    .optional()
    .map_err(|e| Error::archive(e.to_string()))
}

/// Create or refresh the entry for `path` with status `pending`.
///
/// Must exist before original flags can be snapshotted (FK parent row).
pub fn record_pending(conn: &Connection, path: &str, fingerprint: Fingerprint) -> Result<()> {
    conn.execute(
        "INSERT INTO archive (file_path, fingerprint, status)
         VALUES (?1, ?2, 'pending')
         ON CONFLICT(file_path) DO UPDATE SET
             fingerprint = excluded.fingerprint,
             status = 'pending',
             error = NULL,
             updated_at = datetime('now')",
        params![path, fingerprint.to_string()],
    )
    .map_err(|e| Error::archive(e.to_string()))?;
    Ok(())
}

/// Snapshot the original flags for `path`.
///
/// `ON CONFLICT DO NOTHING`: the first-seen state is authoritative and a
/// re-run after mutation must never overwrite it, or restore would write
/// back the mutated flags.
pub fn snapshot_original_flags(
    conn: &Connection,
    path: &str,
    flags: &[OriginalFlags],
) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO original_flags
                 (file_path, track_uid, default_flag, forced_flag, enabled_flag)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_path, track_uid) DO NOTHING",
        )
        .map_err(|e| Error::archive(e.to_string()))?;

    for of in flags {
        stmt.execute(params![
            path,
            of.track_uid,
            of.flags.default as i64,
            of.flags.forced as i64,
            of.flags.enabled as i64,
        ])
        .map_err(|e| Error::archive(e.to_string()))?;
    }
    Ok(())
}

/// Record a successfully settled file: fingerprint (captured after the
/// mutation), serialized plan, status `applied`.
pub fn record_applied(
    conn: &Connection,
    path: &str,
    fingerprint: Fingerprint,
    plan: &FlagPlan,
) -> Result<()> {
    let plan_json =
        serde_json::to_string(plan).map_err(|e| Error::archive(format!("plan encode: {e}")))?;
    conn.execute(
        "INSERT INTO archive (file_path, fingerprint, status, applied_plan)
         VALUES (?1, ?2, 'applied', ?3)
         ON CONFLICT(file_path) DO UPDATE SET
             fingerprint = excluded.fingerprint,
             status = 'applied',
             applied_plan = excluded.applied_plan,
             error = NULL,
             updated_at = datetime('now')",
        params![path, fingerprint.to_string(), plan_json],
    )
    .map_err(|e| Error::archive(e.to_string()))?;
    Ok(())
}

/// Update the status (and error text) of an existing entry.
pub fn set_status(
    conn: &Connection,
    path: &str,
    status: ArchiveStatus,
    error: Option<&str>,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE archive SET status = ?2, error = ?3, updated_at = datetime('now')
             WHERE file_path = ?1",
            params![path, status.as_str(), error],
        )
        .map_err(|e| Error::archive(e.to_string()))?;
    if changed == 0 {
        return Err(Error::not_found("archive entry", path));
    }
    Ok(())
}

/// Fetch the original-flag snapshot for `path`, ordered by track UID.
pub fn original_flags(conn: &Connection, path: &str) -> Result<Vec<OriginalFlags>> {
    let mut stmt = conn
        .prepare(
            "SELECT track_uid, default_flag, forced_flag, enabled_flag
             FROM original_flags WHERE file_path = ?1 ORDER BY track_uid",
        )
        .map_err(|e| Error::archive(e.to_string()))?;

    let rows = stmt
        .query_map([path], OriginalFlags::from_row)
        .map_err(|e| Error::archive(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::archive(e.to_string()))
}

/// Delete entries whose file no longer passes `exists`. Snapshot rows go
/// with them via FK cascade. Returns the number of pruned entries.
pub fn prune<F>(conn: &Connection, exists: F) -> Result<usize>
where
    F: Fn(&str) -> bool,
{
    let paths: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT file_path FROM archive")
            .map_err(|e| Error::archive(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::archive(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::archive(e.to_string()))?
    };

    let mut pruned = 0;
    for path in paths {
        if exists(&path) {
            continue;
        }
        conn.execute("DELETE FROM archive WHERE file_path = ?1", [&path])
            .map_err(|e| Error::archive(e.to_string()))?;
        tracing::debug!(path, "pruned archive entry");
        pruned += 1;
    }
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use mkp_core::TrackFlags;

    fn fp(size: u64) -> Fingerprint {
        Fingerprint {
            size,
            mtime_secs: 1_700_000_000,
        }
    }

    const ORIGINAL: TrackFlags = TrackFlags {
        default: true,
        forced: false,
        enabled: true,
    };

    #[test]
    fn lookup_missing_returns_none() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        assert!(lookup(&conn, "/m/x.mkv").unwrap().is_none());
    }

    #[test]
    fn pending_then_applied_lifecycle() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        record_pending(&conn, "/m/x.mkv", fp(100)).unwrap();
        let entry = lookup(&conn, "/m/x.mkv").unwrap().unwrap();
        assert_eq!(entry.status, ArchiveStatus::Pending);

        record_applied(&conn, "/m/x.mkv", fp(100), &FlagPlan::default()).unwrap();
        let entry = lookup(&conn, "/m/x.mkv").unwrap().unwrap();
        assert_eq!(entry.status, ArchiveStatus::Applied);
        assert_eq!(entry.fingerprint, fp(100));
        assert!(entry.plan().unwrap().unwrap().is_empty());
    }

    #[test]
    fn first_seen_snapshot_is_immutable() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        record_pending(&conn, "/m/x.mkv", fp(100)).unwrap();
        snapshot_original_flags(
            &conn,
            "/m/x.mkv",
            &[OriginalFlags {
                track_uid: 42,
                flags: ORIGINAL,
            }],
        )
        .unwrap();

        // A later snapshot with different flags must not replace the first.
        let mutated = TrackFlags {
            default: false,
            forced: true,
            enabled: true,
        };
        snapshot_original_flags(
            &conn,
            "/m/x.mkv",
            &[OriginalFlags {
                track_uid: 42,
                flags: mutated,
            }],
        )
        .unwrap();

        let flags = original_flags(&conn, "/m/x.mkv").unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].flags, ORIGINAL);
    }

    #[test]
    fn set_status_records_error() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        record_pending(&conn, "/m/x.mkv", fp(100)).unwrap();
        set_status(&conn, "/m/x.mkv", ArchiveStatus::Failed, Some("exit 2")).unwrap();

        let entry = lookup(&conn, "/m/x.mkv").unwrap().unwrap();
        assert_eq!(entry.status, ArchiveStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("exit 2"));
    }

    #[test]
    fn set_status_on_missing_entry_fails() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        assert!(set_status(&conn, "/m/x.mkv", ArchiveStatus::Restored, None).is_err());
    }

    #[test]
    fn prune_removes_missing_files_and_cascades() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        for path in ["/m/keep.mkv", "/m/gone.mkv"] {
            record_pending(&conn, path, fp(1)).unwrap();
            snapshot_original_flags(
                &conn,
                path,
                &[OriginalFlags {
                    track_uid: 1,
                    flags: ORIGINAL,
                }],
            )
            .unwrap();
        }

        let pruned = prune(&conn, |p| p == "/m/keep.mkv").unwrap();
        assert_eq!(pruned, 1);
        assert!(lookup(&conn, "/m/keep.mkv").unwrap().is_some());
        assert!(lookup(&conn, "/m/gone.mkv").unwrap().is_none());
        assert!(original_flags(&conn, "/m/gone.mkv").unwrap().is_empty());
    }
}
