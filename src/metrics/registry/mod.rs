// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metrics registry and update logic

mod cleanup;
mod init;
mod scrape;
mod update;

use crate::metrics::labels::{CacheLabels, CacheNameLabels, NodeLabels};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Mutex<Registry>>,
    // per-node gauges from the latest snapshot
    node_available: Family<NodeLabels, Gauge>,
    node_xray_running: Family<NodeLabels, Gauge>,
    node_cpu_percent: Family<NodeLabels, Gauge<f64, AtomicU64>>,
    node_online_clients: Family<NodeLabels, Gauge>,
    node_traffic_bytes: Family<NodeLabels, Gauge>,
    // poll bookkeeping
    poll_success: Family<NodeLabels, Counter>,
    poll_errors: Family<NodeLabels, Counter>,
    poll_duration_milliseconds: Family<NodeLabels, Gauge>,
    poll_last_success_timestamp_seconds: Family<NodeLabels, Gauge>,
    poll_interval_seconds: Family<NodeLabels, Gauge>,
    consecutive_failures: Family<NodeLabels, Gauge>,
    snapshot_deltas: Family<NodeLabels, Counter>,
    // collector-wide
    collector_tick_duration_milliseconds: Gauge,
    collector_nodes: Gauge,
    ws_subscribers: Gauge,
    // caches
    cache_requests: Family<CacheLabels, Counter>,
    cache_refresh_errors: Family<CacheNameLabels, Counter>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
