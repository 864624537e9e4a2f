// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Cleanup of label sets for nodes that left the registry

use crate::metrics::labels::NodeLabels;

use super::MetricsRegistry;

impl MetricsRegistry {
    /// Remove every per-node series of a node
    ///
    /// Called when the node disappears from the registry so removed nodes do
    /// not keep exporting their last values forever.
    pub fn remove_node(&self, node: &str) {
        let labels = NodeLabels::new(node);
        self.node_available.remove(&labels);
        self.node_xray_running.remove(&labels);
        self.node_cpu_percent.remove(&labels);
        self.node_online_clients.remove(&labels);
        self.node_traffic_bytes.remove(&labels);
        self.poll_success.remove(&labels);
        self.poll_errors.remove(&labels);
        self.poll_duration_milliseconds.remove(&labels);
        self.poll_last_success_timestamp_seconds.remove(&labels);
        self.poll_interval_seconds.remove(&labels);
        self.consecutive_failures.remove(&labels);
        self.snapshot_deltas.remove(&labels);
        tracing::debug!("Removed metric label sets for node {}", node);
    }
}
