// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! In-memory per-node history with rate limiting and retention pruning

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::snapshot::{Snapshot, unix_now};

use super::SnapshotSink;

/// One retained sample of a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: f64,
    pub available: bool,
    pub xray_running: bool,
    pub cpu: f64,
    pub online_clients: u64,
    pub traffic_total: u64,
    pub poll_ms: f64,
}

impl From<&Snapshot> for HistoryPoint {
    fn from(snapshot: &Snapshot) -> Self {
        HistoryPoint {
            timestamp: snapshot.timestamp,
            available: snapshot.available,
            xray_running: snapshot.xray_running,
            cpu: snapshot.cpu,
            online_clients: snapshot.online_clients,
            traffic_total: snapshot.traffic_total,
            poll_ms: snapshot.poll_ms,
        }
    }
}

#[derive(Default)]
struct NodeSeries {
    last_recorded: Option<Instant>,
    points: VecDeque<HistoryPoint>,
}

pub struct HistoryStore {
    config: HistoryConfig,
    series: RwLock<HashMap<String, NodeSeries>>,
}

impl HistoryStore {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Store a point unless the node was recorded less than `min_interval` ago.
    ///
    /// Returns whether the point was kept.
    pub async fn record(&self, snapshot: &Snapshot) -> bool {
        let now = Instant::now();
        let mut series = self.series.write().await;
        let entry = series.entry(snapshot.name.clone()).or_default();

        let limited = entry
            .last_recorded
            .is_some_and(|last| now.duration_since(last) < self.config.min_interval);
        if limited {
            tracing::trace!("History for {} is rate limited", snapshot.name);
            return false;
        }

        entry.last_recorded = Some(now);
        entry.points.push_back(HistoryPoint::from(snapshot));
        true
    }

    /// Points of a node, oldest first
    pub async fn history(&self, node: &str) -> Option<Vec<HistoryPoint>> {
        self.series
            .read()
            .await
            .get(node)
            .map(|s| s.points.iter().cloned().collect())
    }

    #[cfg(test)]
    async fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.series.read().await.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    pub async fn remove_node(&self, node: &str) {
        self.series.write().await.remove(node);
    }

    /// Drop points with a timestamp before `cutoff`; returns how many went
    pub async fn prune_older_than(&self, cutoff: f64) -> usize {
        let mut series = self.series.write().await;
        let mut removed = 0;
        for s in series.values_mut() {
            while s.points.front().is_some_and(|p| p.timestamp < cutoff) {
                s.points.pop_front();
                removed += 1;
            }
        }
        removed
    }

    /// Drop points older than the retention window
    pub async fn prune(&self) -> usize {
        let cutoff = unix_now() - self.config.retention.as_secs_f64();
        let removed = self.prune_older_than(cutoff).await;
        if removed > 0 {
            tracing::debug!("Pruned {} history point(s)", removed);
        }
        removed
    }
}

#[async_trait]
impl SnapshotSink for HistoryStore {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.record(snapshot).await;
        Ok(())
    }

    async fn on_node_removed(&self, node: &str) {
        self.remove_node(node).await;
    }
}

/// Starts a background task pruning history every `prune_interval`
pub fn start_history_prune_task(
    store: Arc<HistoryStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = store.config.prune_interval;
    tracing::info!("Starting history pruning every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.prune().await;
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Stopping history pruning");
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
    use std::time::Duration;

    fn config() -> HistoryConfig {
        HistoryConfig {
            min_interval: Duration::from_secs(30),
            retention: Duration::from_secs(3600),
            prune_interval: Duration::from_secs(300),
        }
    }

    fn snapshot(name: &str, timestamp: f64) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            node_id: None,
            available: true,
            xray_running: true,
            cpu: 3.0,
            online_clients: 1,
            traffic_total: 10,
            poll_ms: 5.0,
            timestamp,
            error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_per_node() {
        let store = HistoryStore::new(config());
        assert!(store.record(&snapshot("a", 1.0)).await);
        assert!(!store.record(&snapshot("a", 2.0)).await);
        assert!(store.record(&snapshot("b", 2.0)).await);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.record(&snapshot("a", 31.0)).await);

        let points = store.history("a").await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1.0);
        assert_eq!(store.nodes().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_old_points() {
        let store = HistoryStore::new(config());
        store.record(&snapshot("a", 100.0)).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        store.record(&snapshot("a", 200.0)).await;

        assert_eq!(store.prune_older_than(150.0).await, 1);
        let points = store.history("a").await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, 200.0);
    }

    #[tokio::test]
    async fn test_prune_uses_retention_window() {
        let store = HistoryStore::new(config());
        store.record(&snapshot("old", unix_now() - 7200.0)).await;
        store.record(&snapshot("new", unix_now())).await;

        assert_eq!(store.prune().await, 1);
        assert!(store.history("old").await.unwrap().is_empty());
        assert_eq!(store.history("new").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_removed_node_has_no_history() {
        let store = HistoryStore::new(config());
        store.on_snapshot(&snapshot("a", 1.0)).await.unwrap();
        store.on_node_removed("a").await;
        assert!(store.history("a").await.is_none());
    }

    #[tokio::test]
    async fn test_prune_task_respects_shutdown_signal() {
        let store = Arc::new(HistoryStore::new(config()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = start_history_prune_task(store, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("prune task should stop on shutdown")
            .unwrap();
    }
}
