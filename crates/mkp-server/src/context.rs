//! Shared application context for route handlers.

use std::sync::Arc;

use tokio::sync::mpsc;

use mkp_core::Config;

use crate::coordinator::{Coordinator, ProcessRequest};

/// State shared by all request handlers (via Axum state).
///
/// Cheaply cloneable: only `Arc`s and a channel sender.
#[derive(Clone)]
pub struct AppContext {
    /// The mutation coordinator.
    pub coordinator: Arc<Coordinator>,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Bounded processing queue drained by the worker pool.
    pub queue: mpsc::Sender<ProcessRequest>,
}
