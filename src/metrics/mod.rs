// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prometheus metrics for the fleet collector
//!
//! Contains label types and the metrics registry fed by the collector,
//! the caches and the broadcast hub.

mod labels;
mod registry;

/// Labels for nodes and caches
pub use labels::{CacheLabels, CacheNameLabels, NodeLabels};

/// Prometheus metrics registry
pub use registry::MetricsRegistry;
