//! Application state shared across HTTP handlers

use std::sync::Arc;

use crate::broadcast::BroadcastHub;
use crate::cache::FleetViews;
use crate::collector::SnapshotCollector;
use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::registry::NodeRegistry;
use crate::sink::HistoryStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub metrics: MetricsRegistry,
    pub registry: Arc<dyn NodeRegistry>,
    pub collector: Arc<SnapshotCollector>,
    pub views: Arc<FleetViews>,
    pub hub: Arc<BroadcastHub>,
    pub history: Arc<HistoryStore>,
}
