// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Snapshot sinks
//!
//! Every poll outcome is forwarded to a [`SnapshotSink`]. Sink failures are
//! logged by the caller and never affect polling.

mod history;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::metrics::MetricsRegistry;
use crate::snapshot::Snapshot;

pub use history::{HistoryPoint, HistoryStore, start_history_prune_task};

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Called once when a node leaves the registry
    async fn on_node_removed(&self, _node: &str) {}
}

#[async_trait]
impl SnapshotSink for MetricsRegistry {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.record_snapshot(snapshot);
        Ok(())
    }
}

/// Fans a snapshot out to several sinks
#[derive(Default, Clone)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl CompositeSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl SnapshotSink for CompositeSink {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.on_snapshot(snapshot).await {
                tracing::warn!("Sink failed for node {}: {}", snapshot.name, e);
            }
        }
        Ok(())
    }

    async fn on_node_removed(&self, node: &str) {
        for sink in &self.sinks {
            sink.on_node_removed(node).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink;

    #[async_trait]
    impl SnapshotSink for FailingSink {
        async fn on_snapshot(&self, _snapshot: &Snapshot) -> Result<()> {
            Err(AppError::Sink("disk full".into()))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        snapshots: AtomicUsize,
        removed: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSink for CountingSink {
        async fn on_snapshot(&self, _snapshot: &Snapshot) -> Result<()> {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_node_removed(&self, _node: &str) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_composite_continues_past_failing_sink() {
        let counting = Arc::new(CountingSink::default());
        let sink = CompositeSink::new()
            .with(Arc::new(FailingSink))
            .with(counting.clone());
        assert_eq!(sink.len(), 2);

        let snapshot = Snapshot::unavailable("a", None, "down");
        assert!(sink.on_snapshot(&snapshot).await.is_ok());
        sink.on_node_removed("a").await;

        assert_eq!(counting.snapshots.load(Ordering::SeqCst), 1);
        assert_eq!(counting.removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metrics_sink_records_snapshot() {
        let metrics = MetricsRegistry::new();
        let snapshot = Snapshot::unavailable("de-1", None, "down");
        metrics.on_snapshot(&snapshot).await.unwrap();
        let text = metrics.encode_metrics().await.unwrap();
        assert!(text.contains("fleet_node_available{node=\"de-1\"} 0"));
        assert!(text.contains("fleet_poll_errors_total{node=\"de-1\"} 1"));
    }
}
