// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for convenient use.
//! Users of the library can import everything they need with:
//!
//! ```rust
//! use fleet_collector::prelude::*;
//! ```

// Core types
pub use crate::config::{CollectorConfig, Config, NodeDescriptor};
pub use crate::error::{AppError, Result};
pub use crate::snapshot::Snapshot;

// Capabilities
pub use crate::broadcast::Publisher;
pub use crate::cache::DistributedCache;
pub use crate::panel::PanelClient;
pub use crate::registry::NodeRegistry;
pub use crate::sink::SnapshotSink;

// Components
pub use crate::broadcast::BroadcastHub;
pub use crate::cache::{FleetViews, GroupBy, SwrCache};
pub use crate::collector::{LatestSnapshot, SnapshotCollector};
pub use crate::metrics::MetricsRegistry;
pub use crate::sink::{CompositeSink, HistoryStore};
