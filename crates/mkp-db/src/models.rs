//! Typed models for archive rows.

use rusqlite::types::Type;
use rusqlite::Row;

use mkp_core::{Error, Fingerprint, Result, TrackFlags};
use mkp_engine::FlagPlan;

/// Lifecycle state of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Entry created, mutation not yet confirmed.
    Pending,
    /// Plan applied (or verified empty); the file is settled at the
    /// recorded fingerprint.
    Applied,
    /// The mutation tool failed; `error` holds the diagnostic.
    Failed,
    /// Original flags were written back; the entry is kept for history.
    Restored,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Pending => "pending",
            ArchiveStatus::Applied => "applied",
            ArchiveStatus::Failed => "failed",
            ArchiveStatus::Restored => "restored",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ArchiveStatus::Pending),
            "applied" => Ok(ArchiveStatus::Applied),
            "failed" => Ok(ArchiveStatus::Failed),
            "restored" => Ok(ArchiveStatus::Restored),
            other => Err(Error::archive(format!("unknown archive status: {other}"))),
        }
    }
}

impl std::fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `archive` table.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_path: String,
    pub fingerprint: Fingerprint,
    pub status: ArchiveStatus,
    /// Serialized plan JSON, absent for rows that never got a plan.
    pub applied_plan: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ArchiveEntry {
    /// Map a `SELECT file_path, fingerprint, status, applied_plan, error,
    /// created_at, updated_at` row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let fingerprint_text: String = row.get(1)?;
        let fingerprint = fingerprint_text.parse::<Fingerprint>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;
        let status_text: String = row.get(2)?;
        let status = ArchiveStatus::parse(&status_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )),
            )
        })?;

        Ok(Self {
            file_path: row.get(0)?,
            fingerprint,
            status,
            applied_plan: row.get(3)?,
            error: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Deserialize the stored plan, if any.
    pub fn plan(&self) -> Result<Option<FlagPlan>> {
        match &self.applied_plan {
            None => Ok(None),
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|e| Error::archive(format!("corrupt stored plan: {e}"))),
        }
    }
}

/// First-seen flag snapshot of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalFlags {
    pub track_uid: i64,
    pub flags: TrackFlags,
}

impl OriginalFlags {
    /// Map a `SELECT track_uid, default_flag, forced_flag, enabled_flag` row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            track_uid: row.get(0)?,
            flags: TrackFlags {
                default: row.get::<_, i64>(1)? != 0,
                forced: row.get::<_, i64>(2)? != 0,
                enabled: row.get::<_, i64>(3)? != 0,
            },
        })
    }
}
