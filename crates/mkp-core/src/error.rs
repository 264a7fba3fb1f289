//! Unified error type for the mkvpriority application.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the HTTP receiver to derive a status code via
//! [`Error::http_status`] and for the batch CLI to decide whether a failure
//! is fatal to a single file or to the whole run.

use std::fmt;
use std::path::PathBuf;

/// Unified error type covering all failure modes in mkvpriority.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A scoring profile or application config could not be loaded or parsed.
    /// Fatal to requests using that config, never to the whole process.
    #[error("Config error: {0}")]
    Config(String),

    /// The external extractor could not read the container.
    #[error("Extraction error [{}]: {message}", path.display())]
    Extraction {
        /// The file that could not be read.
        path: PathBuf,
        /// Diagnostic text from the extractor.
        message: String,
    },

    /// The flag mutation tool exited non-zero or produced garbage.
    #[error("Mutation error [{tool}]: {message}")]
    Mutation {
        /// Name of the tool that failed.
        tool: String,
        /// Diagnostic text, including the tool's stderr.
        message: String,
    },

    /// A container rewrite (reorder/strip) failed. Distinct from
    /// [`Error::Mutation`] so callers never confuse the two classes.
    #[error("Remux error [{tool}]: {message}")]
    Remux {
        /// Name of the tool that failed.
        tool: String,
        /// Diagnostic text, including the tool's stderr.
        message: String,
    },

    /// The archive store failed a persistence operation. Escalated: losing
    /// the idempotency ledger risks redundant or inconsistent mutations.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The per-file lock could not be acquired within the bounded wait;
    /// the duplicate request is dropped rather than queued indefinitely.
    #[error("File is busy: {}", path.display())]
    LockBusy {
        /// The path whose lock was held elsewhere.
        path: PathBuf,
    },

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "archive entry", "tool").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Config(_) => 400,
            Error::Extraction { .. } => 422,
            Error::Mutation { .. } => 502,
            Error::Remux { .. } => 502,
            Error::Archive(_) => 500,
            Error::LockBusy { .. } => 409,
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error is confined to a single file and should not abort
    /// a batch or the service.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::Extraction { .. }
                | Error::Mutation { .. }
                | Error::Remux { .. }
                | Error::LockBusy { .. }
        )
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Convenience constructor for [`Error::Extraction`].
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Mutation`].
    pub fn mutation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mutation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Remux`].
    pub fn remux(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Remux {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Archive`].
    pub fn archive(message: impl Into<String>) -> Self {
        Error::Archive(message.into())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
