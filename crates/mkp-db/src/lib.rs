//! mkp-db: the archive persistence layer.
//!
//! SQLite-backed storage with connection pooling, embedded migrations,
//! typed models, and query modules. The archive is the idempotency ledger:
//! it records which files were processed at which fingerprint, the applied
//! plan, and the first-seen original flags needed for restore.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::{ArchiveEntry, ArchiveStatus, OriginalFlags};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
