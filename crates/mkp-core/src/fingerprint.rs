//! File identity fingerprinting.
//!
//! A [`Fingerprint`] distinguishes "same file, unchanged" from "replaced
//! file" across runs. Equality contract: two fingerprints are equal iff the
//! file size in bytes and the modification time truncated to whole seconds
//! are both equal. Truncation to seconds keeps the comparison stable across
//! filesystems with different timestamp granularity.
//!
//! The archive records the fingerprint taken *after* a successful mutation,
//! so the engine's own in-place header edits (which bump mtime) do not
//! invalidate the entry and cause reprocessing loops. A file replaced by an
//! upgrade changes size and/or mtime and is picked up again.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// Size + mtime identity of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes.
    pub size: u64,
    /// Modification time as whole seconds since the Unix epoch.
    pub mtime_secs: i64,
}

impl Fingerprint {
    /// Read the fingerprint of the file at `path`.
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mtime_secs = match meta.modified()?.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            // Pre-epoch mtimes exist on some filesystems; count backwards.
            Err(e) => -(e.duration().as_secs() as i64),
        };
        Ok(Self {
            size: meta.len(),
            mtime_secs,
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.size, self.mtime_secs)
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (size, mtime) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed fingerprint: {s:?}"))?;
        Ok(Self {
            size: size
                .parse()
                .map_err(|e| format!("bad fingerprint size: {e}"))?,
            mtime_secs: mtime
                .parse()
                .map_err(|e| format!("bad fingerprint mtime: {e}"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn display_and_parse_round_trip() {
        let fp = Fingerprint {
            size: 123456,
            mtime_secs: 1_700_000_000,
        };
        let s = fp.to_string();
        assert_eq!(s, "123456:1700000000");
        assert_eq!(s.parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("nope".parse::<Fingerprint>().is_err());
        assert!("12:ab".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn of_reflects_file_size() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        f.flush().unwrap();

        let fp = Fingerprint::of(f.path()).unwrap();
        assert_eq!(fp.size, 5);
    }

    #[test]
    fn of_changes_when_content_grows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        f.flush().unwrap();
        let before = Fingerprint::of(f.path()).unwrap();

        f.write_all(b" world").unwrap();
        f.flush().unwrap();
        let after = Fingerprint::of(f.path()).unwrap();

        assert_ne!(before, after);
    }
}
