// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metric update logic for node snapshots

use crate::metrics::labels::NodeLabels;
use crate::snapshot::Snapshot;
use std::time::Duration;

use super::MetricsRegistry;

fn gauge_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl MetricsRegistry {
    /// Update gauges and poll counters from one poll outcome
    ///
    /// Failed polls only touch the availability gauge and the error counter,
    /// so the last known CPU/clients/traffic values stay visible.
    pub fn record_snapshot(&self, snapshot: &Snapshot) {
        let labels = NodeLabels::new(snapshot.name.clone());

        self.node_available
            .get_or_create(&labels)
            .set(i64::from(snapshot.available));

        #[allow(clippy::cast_possible_truncation)]
        let millis = snapshot.poll_ms.round() as i64;
        self.poll_duration_milliseconds
            .get_or_create(&labels)
            .set(millis);

        if !snapshot.available {
            self.poll_errors.get_or_create(&labels).inc();
            return;
        }

        self.node_xray_running
            .get_or_create(&labels)
            .set(i64::from(snapshot.xray_running));
        self.node_cpu_percent
            .get_or_create(&labels)
            .set(snapshot.cpu);
        self.node_online_clients
            .get_or_create(&labels)
            .set(gauge_value(snapshot.online_clients));
        self.node_traffic_bytes
            .get_or_create(&labels)
            .set(gauge_value(snapshot.traffic_total));

        self.poll_success.get_or_create(&labels).inc();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.poll_last_success_timestamp_seconds
            .get_or_create(&labels)
            .set(gauge_value(now));
    }

    /// Record the interval chosen for the next poll of a node
    pub fn record_poll_schedule(&self, node: &str, interval: Duration, consecutive_failures: u32) {
        let labels = NodeLabels::new(node);
        self.poll_interval_seconds
            .get_or_create(&labels)
            .set(gauge_value(interval.as_secs()));
        self.consecutive_failures
            .get_or_create(&labels)
            .set(i64::from(consecutive_failures));
    }

    /// Count a broadcast content change
    pub fn record_delta(&self, node: &str) {
        self.snapshot_deltas
            .get_or_create(&NodeLabels::new(node))
            .inc();
    }
}
