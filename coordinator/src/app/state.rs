//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::aggregator::SummaryRegistry;
use crate::dispatch::Dispatcher;

/// Main application state
pub struct AppState {
    /// Version reported at startup
    pub version: String,

    /// Summaries in flight
    pub registry: Arc<SummaryRegistry>,

    /// Request dispatcher over `registry`
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(version: String) -> Self {
        info!("Initializing application state...");
        let registry = Arc::new(SummaryRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone());
        Self {
            version,
            registry,
            dispatcher,
        }
    }

    /// Log what is left in flight
    pub fn shutdown(&self) {
        let pending = self
            .registry
            .list()
            .into_iter()
            .filter(|summary| !summary.is_finished())
            .count();
        info!(
            "Shutting down application state with {} of {} summaries unfinished",
            pending,
            self.registry.len()
        );
    }
}
