// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Periodic pushes of the snapshot table and cached traffic stats

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::{FleetViews, GroupBy};
use crate::collector::SnapshotCollector;

use super::{BroadcastHub, channels, envelope};

/// One round of live updates; channels without subscribers are skipped
pub(crate) async fn push_live_updates(
    hub: &BroadcastHub,
    collector: &SnapshotCollector,
    views: &FleetViews,
) {
    if hub.has_subscribers(channels::SERVER_STATUS).await {
        let latest = collector.latest_snapshot().await;
        hub.broadcast(
            &envelope("server_status", json!(latest)),
            channels::SERVER_STATUS,
        )
        .await;
    }

    if hub.has_subscribers(channels::TRAFFIC).await {
        match views.traffic_stats(GroupBy::Client).await {
            Ok(stats) => {
                hub.broadcast(&envelope("traffic_update", json!(stats)), channels::TRAFFIC)
                    .await;
            }
            Err(e) => tracing::warn!("Skipping traffic update: {}", e),
        }
    }
}

/// Starts the live update task, one round every `period`
pub fn start_live_updates_task(
    hub: Arc<BroadcastHub>,
    collector: Arc<SnapshotCollector>,
    views: Arc<FleetViews>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tracing::info!("Starting live updates every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    push_live_updates(&hub, &collector, &views).await;
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!("Stopping live updates");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, CollectorConfig, NodeDescriptor};
    use crate::error::{AppError, Result};
    use crate::metrics::MetricsRegistry;
    use crate::panel::{ClientStat, Inbound, PanelClient, ServerStatus};
    use crate::registry::StaticRegistry;
    use crate::sink::CompositeSink;
    use async_trait::async_trait;

    struct StubPanel;

    #[async_trait]
    impl PanelClient for StubPanel {
        async fn server_status(&self, _node: &NodeDescriptor) -> Result<ServerStatus> {
            Err(AppError::Panel("unreachable".into()))
        }

        async fn inbounds(&self, _node: &NodeDescriptor) -> Result<Vec<Inbound>> {
            Ok(vec![Inbound {
                id: 1,
                client_stats: Some(vec![ClientStat {
                    email: "alice".into(),
                    up: 1,
                    down: 2,
                    enable: true,
                }]),
                ..Inbound::default()
            }])
        }

        async fn online_clients(&self, _node: &NodeDescriptor) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    fn setup() -> (Arc<BroadcastHub>, Arc<SnapshotCollector>, Arc<FleetViews>) {
        let registry = Arc::new(StaticRegistry::new(vec![NodeDescriptor {
            id: Some(1),
            name: "de-1".into(),
            host: "10.0.0.1".into(),
            port: 2053,
            base_path: String::new(),
            username: "admin".into(),
            password: String::new(),
            verify_tls: false,
        }]));
        let panel = Arc::new(StubPanel);
        let hub = Arc::new(BroadcastHub::new());
        let collector = Arc::new(SnapshotCollector::new(
            registry.clone(),
            panel.clone(),
            hub.clone(),
            Arc::new(CompositeSink::new()),
            MetricsRegistry::new(),
            CollectorConfig::default(),
        ));
        let views = Arc::new(FleetViews::new(registry, panel, CacheConfig::default(), 2));
        (hub, collector, views)
    }

    #[tokio::test]
    async fn test_push_only_to_subscribed_channels() {
        let (hub, collector, views) = setup();
        let mut status = hub.connect().await;
        hub.subscribe(status.id, channels::SERVER_STATUS).await;
        let mut traffic = hub.connect().await;
        hub.subscribe(traffic.id, channels::TRAFFIC).await;

        push_live_updates(&hub, &collector, &views).await;

        let message: serde_json::Value =
            serde_json::from_str(&status.rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["type"], "server_status");
        assert_eq!(message["data"]["count"], 0);
        assert!(status.rx.try_recv().is_err());

        let message: serde_json::Value =
            serde_json::from_str(&traffic.rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["type"], "traffic_update");
        assert_eq!(message["data"]["stats"]["alice"]["total"], 3);
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let (hub, collector, views) = setup();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = start_live_updates_task(
            hub,
            collector,
            views,
            Duration::from_secs(5),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("live update task should stop on shutdown")
            .unwrap();
    }
}
