//! mkp-core: shared types, errors, and configuration.
//!
//! This crate is the foundational dependency for all other mkp-* crates,
//! providing the track model, flag modes, the file fingerprint type, the
//! unified error type, and both scoring-profile and application
//! configuration.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod track;

// Re-export the most commonly used items at the crate root.
pub use config::{Config, Profile, ProfileSet};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use track::{FlagMode, Track, TrackFlags, TrackKind};
