//! mkp-av: the external tool boundary.
//!
//! This crate owns everything that shells out: tool discovery, the async
//! command runner with a bounded timeout, the `mkvmerge --identify` track
//! extractor, the `mkvpropedit` flag writer, and the `mkvmerge` remuxer.
//! The [`Extractor`] and [`FlagWriter`] traits are the seams the coordinator
//! is tested through.

pub mod command;
pub mod extract;
pub mod propedit;
pub mod remux;
pub mod tools;

pub use command::{CommandFailure, ToolCommand, ToolOutput};
pub use extract::{Extractor, MkvmergeExtractor};
pub use propedit::{FlagWriter, MkvpropeditWriter};
pub use remux::{MkvmergeRemuxer, Remuxer};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
