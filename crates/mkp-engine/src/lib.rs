//! mkp-engine: pure track scoring and plan construction.
//!
//! Everything in this crate is deterministic and free of I/O: the scorer
//! turns a track plus a profile into an integer, and the planner turns a
//! track list plus a profile into a set of flag deltas (and, on request, a
//! remux plan). Side effects live in mkp-av and mkp-server.

pub mod planner;
pub mod scorer;

pub use planner::{plan, plan_remux, FlagDelta, FlagPlan, RemuxOptions, RemuxPlan, ScoredTrack};
pub use scorer::score;
