// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Registry initialization and metric registration

use crate::metrics::labels::{CacheLabels, CacheNameLabels, NodeLabels};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::Mutex;

use super::MetricsRegistry;

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let node_available = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_node_available",
            "Node answered the last poll (1=available,0=down)",
            node_available.clone(),
        );
        let node_xray_running = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_node_xray_running",
            "Xray process state on the node (1=running,0=stopped)",
            node_xray_running.clone(),
        );
        let node_cpu_percent = Family::<NodeLabels, Gauge<f64, AtomicU64>>::default();
        registry.register(
            "fleet_node_cpu_percent",
            "CPU usage percentage reported by the panel",
            node_cpu_percent.clone(),
        );
        let node_online_clients = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_node_online_clients",
            "Number of connected clients",
            node_online_clients.clone(),
        );
        let node_traffic_bytes = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_node_traffic_bytes",
            "Sum of inbound upload and download bytes",
            node_traffic_bytes.clone(),
        );

        let poll_success = Family::<NodeLabels, Counter>::default();
        registry.register(
            "fleet_poll_success",
            "Successful polls per node",
            poll_success.clone(),
        );
        let poll_errors = Family::<NodeLabels, Counter>::default();
        registry.register(
            "fleet_poll_errors",
            "Failed polls per node",
            poll_errors.clone(),
        );
        let poll_duration_milliseconds = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_poll_duration_milliseconds",
            "Duration of last poll in milliseconds",
            poll_duration_milliseconds.clone(),
        );
        let poll_last_success_timestamp_seconds = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_poll_last_success_timestamp_seconds",
            "Unix timestamp of last successful poll",
            poll_last_success_timestamp_seconds.clone(),
        );
        let poll_interval_seconds = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_poll_interval_seconds",
            "Current adaptive polling interval",
            poll_interval_seconds.clone(),
        );
        let consecutive_failures = Family::<NodeLabels, Gauge>::default();
        registry.register(
            "fleet_poll_consecutive_failures",
            "Number of consecutive failed polls",
            consecutive_failures.clone(),
        );
        let snapshot_deltas = Family::<NodeLabels, Counter>::default();
        registry.register(
            "fleet_snapshot_deltas",
            "Snapshot content changes broadcast per node",
            snapshot_deltas.clone(),
        );

        let collector_tick_duration_milliseconds = Gauge::default();
        registry.register(
            "fleet_collector_tick_duration_milliseconds",
            "Duration of the last scheduler tick (registry read and dispatch)",
            collector_tick_duration_milliseconds.clone(),
        );
        let collector_nodes = Gauge::default();
        registry.register(
            "fleet_collector_nodes",
            "Number of nodes known to the collector",
            collector_nodes.clone(),
        );
        let ws_subscribers = Gauge::default();
        registry.register(
            "fleet_ws_subscribers",
            "Number of connected real-time subscribers",
            ws_subscribers.clone(),
        );

        let cache_requests = Family::<CacheLabels, Counter>::default();
        registry.register(
            "fleet_cache_requests",
            "Cache reads by outcome (fresh, stale, miss, shared)",
            cache_requests.clone(),
        );
        let cache_refresh_errors = Family::<CacheNameLabels, Counter>::default();
        registry.register(
            "fleet_cache_refresh_errors",
            "Failed background cache refreshes",
            cache_refresh_errors.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            node_available,
            node_xray_running,
            node_cpu_percent,
            node_online_clients,
            node_traffic_bytes,
            poll_success,
            poll_errors,
            poll_duration_milliseconds,
            poll_last_success_timestamp_seconds,
            poll_interval_seconds,
            consecutive_failures,
            snapshot_deltas,
            collector_tick_duration_milliseconds,
            collector_nodes,
            ws_subscribers,
            cache_requests,
            cache_refresh_errors,
        }
    }
}
