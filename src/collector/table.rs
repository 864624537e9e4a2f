// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Latest snapshot per node, read by the HTTP handlers

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::snapshot::Snapshot;

/// Read model of the table: nodes sorted by name
#[derive(Debug, Clone, Serialize)]
pub struct LatestSnapshot {
    pub timestamp: Option<f64>,
    pub nodes: Vec<Snapshot>,
    pub count: usize,
}

#[derive(Default)]
struct TableInner {
    timestamp: Option<f64>,
    nodes: HashMap<String, Snapshot>,
}

#[derive(Default)]
pub struct LatestSnapshotTable {
    inner: RwLock<TableInner>,
}

impl LatestSnapshotTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> LatestSnapshot {
        let inner = self.inner.read().await;
        let mut nodes: Vec<Snapshot> = inner.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        LatestSnapshot {
            timestamp: inner.timestamp,
            count: nodes.len(),
            nodes,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Snapshot> {
        self.inner.read().await.nodes.get(key).cloned()
    }

    /// Replace the entry of a node, returning the previous one
    pub async fn insert(&self, key: String, snapshot: Snapshot) -> Option<Snapshot> {
        let mut inner = self.inner.write().await;
        inner.timestamp = Some(snapshot.timestamp);
        inner.nodes.insert(key, snapshot)
    }

    pub async fn remove(&self, key: &str) -> Option<Snapshot> {
        self.inner.write().await.nodes.remove(key)
    }

    /// Whether any node's last poll failed
    pub async fn any_unavailable(&self) -> bool {
        self.inner.read().await.nodes.values().any(|s| !s.available)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, timestamp: f64) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            node_id: None,
            available: true,
            xray_running: true,
            cpu: 1.0,
            online_clients: 0,
            traffic_total: 0,
            poll_ms: 1.0,
            timestamp,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_empty_table() {
        let table = LatestSnapshotTable::new();
        let latest = table.latest().await;
        assert_eq!(latest.timestamp, None);
        assert_eq!(latest.count, 0);
        assert!(table.is_empty().await);
        assert!(!table.any_unavailable().await);
    }

    #[tokio::test]
    async fn test_latest_is_sorted_by_name() {
        let table = LatestSnapshotTable::new();
        table.insert("b".into(), snapshot("b", 1.0)).await;
        table.insert("a".into(), snapshot("a", 2.0)).await;
        table.insert("c".into(), snapshot("c", 3.0)).await;

        let latest = table.latest().await;
        let names: Vec<_> = latest.nodes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(latest.count, 3);
        assert_eq!(latest.timestamp, Some(3.0));
    }

    #[tokio::test]
    async fn test_insert_returns_previous_and_remove_drops() {
        let table = LatestSnapshotTable::new();
        assert!(table.insert("a".into(), snapshot("a", 1.0)).await.is_none());
        let previous = table.insert("a".into(), snapshot("a", 2.0)).await;
        assert_eq!(previous.map(|s| s.timestamp), Some(1.0));
        assert_eq!(table.len().await, 1);

        table.remove("a").await;
        assert!(table.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_any_unavailable() {
        let table = LatestSnapshotTable::new();
        table.insert("a".into(), snapshot("a", 1.0)).await;
        table
            .insert("b".into(), Snapshot::unavailable("b", None, "down"))
            .await;
        assert!(table.any_unavailable().await);
    }
}
