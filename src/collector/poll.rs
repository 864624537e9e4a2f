// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Single-node poll: combines panel facts into a snapshot

use std::time::Duration;

use crate::config::NodeDescriptor;
use crate::panel::{Inbound, PanelClient};
use crate::snapshot::{Snapshot, unix_now};

/// Poll one node. Never fails; errors become an unavailable snapshot.
///
/// Server status decides availability. Online list and inbound traffic are
/// best effort and fall back to zero with a warning.
pub async fn poll_node(panel: &dyn PanelClient, node: &NodeDescriptor) -> Snapshot {
    let name = node.key();
    tracing::trace!("Polling node {}", name);

    let status = match panel.server_status(node).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("Failed to fetch server status for {}: {}", name, e);
            return Snapshot::unavailable(&name, node.id, e.to_string());
        }
    };

    let (online, inbounds) = tokio::join!(panel.online_clients(node), panel.inbounds(node));

    let online_clients = match online {
        Ok(emails) => emails.len() as u64,
        Err(e) => {
            tracing::warn!("Failed to fetch online clients for {}: {}", name, e);
            0
        }
    };
    let traffic_total = match inbounds {
        Ok(inbounds) => inbounds.iter().map(Inbound::total).sum(),
        Err(e) => {
            tracing::warn!("Failed to fetch inbounds for {}: {}", name, e);
            0
        }
    };

    tracing::trace!(
        "Node {} status: CPU {:.1}%, xray {}, {} online, {} bytes",
        name,
        status.cpu,
        status.xray_state,
        online_clients,
        traffic_total
    );

    Snapshot {
        name,
        node_id: node.id,
        available: true,
        xray_running: status.xray_running(),
        cpu: status.cpu,
        online_clients,
        traffic_total,
        poll_ms: 0.0,
        timestamp: unix_now(),
        error: None,
    }
}

/// [`poll_node`] bounded by `timeout`, with `poll_ms` filled in
pub async fn poll_node_with_timeout(
    panel: &dyn PanelClient,
    node: &NodeDescriptor,
    timeout: Duration,
) -> Snapshot {
    let start = tokio::time::Instant::now();
    let mut snapshot = match tokio::time::timeout(timeout, poll_node(panel, node)).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            tracing::warn!("Poll of {} timed out after {:?}", node.key(), timeout);
            Snapshot::unavailable(&node.key(), node.id, format!("poll timed out after {timeout:?}"))
        }
    };
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    snapshot.poll_ms = (elapsed * 100.0).round() / 100.0;
    snapshot
}
