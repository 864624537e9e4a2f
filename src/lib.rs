// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! # Fleet Collector
//!
//! Snapshot collector and cached read API for a fleet of 3x-ui panel nodes.
//!
//! Each node is polled on its own adaptive schedule: stable nodes are polled
//! less often, failing nodes back off exponentially. Content changes are
//! broadcast to real-time subscribers, every poll feeds the metrics and
//! history sinks, and expensive fleet-wide queries are served through
//! stale-while-revalidate caches.
//!
//! ## Main modules
//! - `api`: HTTP API handlers and WebSocket endpoint
//! - `broadcast`: channel fan-out to real-time subscribers
//! - `cache`: read-through caches and fleet aggregate views
//! - `collector`: adaptive per-node polling and delta detection
//! - `config`: configuration management
//! - `error`: error types
//! - `metrics`: Prometheus registry
//! - `panel`: 3x-ui panel API client
//! - `registry`: node list sources
//! - `sink`: snapshot consumers (metrics, history)
//! - `prelude`: commonly used types and traits

mod api;
mod broadcast;
mod cache;
mod collector;
mod config;
mod error;
mod metrics;
mod panel;
mod registry;
mod sink;
mod snapshot;
pub mod prelude;

// Re-export commonly used types
/// Application configuration
pub use config::{
    CacheConfig, CacheTtl, CollectorConfig, Config, HistoryConfig, NodeDescriptor, parse_nodes,
};

/// Application error and result type
pub use error::{AppError, Result};

/// HTTP API router and state
pub use api::{AppState, create_router, handlers::HealthResponse, handlers::NodeHealth};

/// Snapshot collector and its read model
pub use collector::{
    LatestSnapshot, LatestSnapshotTable, PerNodeState, SnapshotCollector, failure_interval,
    poll_node, poll_node_with_timeout, success_interval,
};

/// Snapshots
pub use snapshot::{Snapshot, unix_now};

/// Broadcast fan-out
pub use broadcast::{
    BroadcastHub, Publisher, Subscription, channels, envelope, start_live_updates_task,
};

/// Caches and aggregate views
pub use cache::{
    ClientRecord, DashboardSummary, DistributedCache, FleetViews, GroupBy, OnlineClient, SwrCache,
    TopClient, TrafficStats, TrafficSummary, TrafficTotals, aggregate_traffic,
};

/// Metrics registry
pub use metrics::{CacheLabels, CacheNameLabels, MetricsRegistry, NodeLabels};

/// Panel client
pub use panel::{
    ClientStat, Inbound, InboundClient, PanelClient, ServerStatus, SessionPool, XuiPanelClient,
    start_session_cleanup_task,
};

/// Node registries
pub use registry::{FileRegistry, NodeRegistry, StaticRegistry};

/// Snapshot sinks
pub use sink::{CompositeSink, HistoryPoint, HistoryStore, SnapshotSink, start_history_prune_task};
