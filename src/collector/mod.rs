// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Fleet snapshot collector
//!
//! A one-second scheduler reads the node registry, reconciles per-node state
//! and dispatches polls for due nodes onto the runtime, gated by a semaphore.
//! Poll results drive the adaptive interval, update the latest-snapshot table,
//! feed the sinks and, when content changed, produce a delta broadcast.

mod delta;
mod poll;
mod state;
mod table;


use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::broadcast::{Publisher, channels, envelope};
use crate::config::{CollectorConfig, NodeDescriptor};
use crate::metrics::MetricsRegistry;
use crate::panel::PanelClient;
use crate::registry::NodeRegistry;
use crate::sink::SnapshotSink;
use crate::snapshot::Snapshot;

pub use poll::{poll_node, poll_node_with_timeout};
pub use state::{PerNodeState, failure_interval, success_interval};
pub use table::{LatestSnapshot, LatestSnapshotTable};

/// Scheduler tick period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Lock order: `states`, then the table's lock. `removal` is never taken
/// while `states` is held. A poll completion holds `removal` shared from its
/// state update until its sink and metric writes are done; node removal
/// takes it exclusively before cleaning up metrics and sinks, so a late
/// completion cannot recreate series for a node that is gone.
pub struct SnapshotCollector {
    registry: Arc<dyn NodeRegistry>,
    panel: Arc<dyn PanelClient>,
    publisher: Arc<dyn Publisher>,
    sink: Arc<dyn SnapshotSink>,
    metrics: MetricsRegistry,
    config: CollectorConfig,
    semaphore: Arc<Semaphore>,
    states: Mutex<HashMap<String, PerNodeState>>,
    removal: RwLock<()>,
    table: LatestSnapshotTable,
    running: AtomicBool,
}

impl SnapshotCollector {
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        panel: Arc<dyn PanelClient>,
        publisher: Arc<dyn Publisher>,
        sink: Arc<dyn SnapshotSink>,
        metrics: MetricsRegistry,
        config: CollectorConfig,
    ) -> Self {
        let config = config.normalized();
        Self {
            registry,
            panel,
            publisher,
            sink,
            metrics,
            semaphore: Arc::new(Semaphore::new(config.max_parallel_polls)),
            config,
            states: Mutex::new(HashMap::new()),
            removal: RwLock::new(()),
            table: LatestSnapshotTable::new(),
            running: AtomicBool::new(false),
        }
    }

    pub async fn latest_snapshot(&self) -> LatestSnapshot {
        self.table.latest().await
    }

    #[must_use]
    pub fn table(&self) -> &LatestSnapshotTable {
        &self.table
    }

    #[must_use]
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Scheduling state of one node, if it is known
    pub async fn node_state(&self, key: &str) -> Option<PerNodeState> {
        self.states.lock().await.get(key).cloned()
    }

    /// Starts the scheduler loop
    ///
    /// Runs one [`tick`](Self::tick) per second until the shutdown signal
    /// flips to `true`. Polls still in flight at shutdown are detached.
    pub fn start(self: &Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        collector.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Starting snapshot collector (base {}s, max {}s, {} parallel polls)",
            collector.config.base_interval.as_secs(),
            collector.config.max_interval.as_secs(),
            collector.config.max_parallel_polls
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Stopping snapshot collector");
                            break;
                        }
                    }
                }

                collector.tick().await;
            }

            collector.running.store(false, Ordering::SeqCst);
        })
    }

    /// One scheduler pass: reconcile the node set and dispatch due polls.
    ///
    /// Returns the handles of the polls spawned in this pass. A registry
    /// failure is logged and leaves all state untouched.
    pub async fn tick(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let started = std::time::Instant::now();

        let nodes = match self.registry.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!("Failed to read node registry: {}", e);
                return Vec::new();
            }
        };

        let now = Instant::now();
        let mut due = Vec::new();
        let (removed, known) = {
            let mut states = self.states.lock().await;

            let active: HashSet<String> = nodes.iter().map(NodeDescriptor::key).collect();
            let removed: Vec<String> = states
                .keys()
                .filter(|key| !active.contains(*key))
                .cloned()
                .collect();
            for key in &removed {
                states.remove(key);
                self.table.remove(key).await;
            }

            for node in nodes {
                let state = states
                    .entry(node.key())
                    .or_insert_with(|| PerNodeState::new(now, &self.config));
                if state.is_due(now) {
                    state.in_flight = true;
                    due.push(node);
                }
            }

            (removed, states.len())
        };

        if !removed.is_empty() {
            // Waits for completions that passed their state check before removal
            let _removal = self.removal.write().await;
            for key in &removed {
                tracing::info!("Node {} left the registry, dropping its state", key);
                self.metrics.remove_node(key);
                self.sink.on_node_removed(key).await;
            }
        }

        let mut handles = Vec::with_capacity(due.len());
        for node in due {
            let collector = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = collector.semaphore.clone().acquire_owned().await else {
                    return;
                };
                // A panicking panel client must not leave the node in flight forever
                let panel = Arc::clone(&collector.panel);
                let timeout = collector.config.poll_timeout;
                let target = node.clone();
                let snapshot = match tokio::spawn(async move {
                    poll_node_with_timeout(panel.as_ref(), &target, timeout).await
                })
                .await
                {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::error!("Poll task for {} failed: {}", node.key(), e);
                        Snapshot::unavailable(
                            &node.key(),
                            node.id,
                            format!("poll task failed: {e}"),
                        )
                    }
                };
                collector.complete_poll(&node.key(), snapshot).await;
            }));
        }

        tracing::trace!(
            "Tick dispatched {} poll(s) across {} node(s)",
            handles.len(),
            known
        );
        self.metrics.record_tick(started.elapsed(), known);
        handles
    }

    /// Apply one poll outcome. Results for nodes removed meanwhile are dropped.
    async fn complete_poll(&self, key: &str, snapshot: Snapshot) {
        let _removal = self.removal.read().await;
        let now = Instant::now();

        let (changed, interval, failures, previous) = {
            let mut states = self.states.lock().await;
            let Some(state) = states.get_mut(key) else {
                tracing::debug!("Dropping poll result for removed node {}", key);
                return;
            };

            let changed = if snapshot.available {
                state.record_success(snapshot.fingerprint(), now, &self.config)
            } else {
                state.record_failure(now, &self.config);
                false
            };
            let interval = state.interval;
            let failures = state.consecutive_failures;
            let previous = self.table.insert(key.to_string(), snapshot.clone()).await;
            (changed, interval, failures, previous)
        };

        self.metrics.record_poll_schedule(key, interval, failures);

        if snapshot.available {
            tracing::debug!(
                "Polled node {} in {:.1}ms, next poll in {}s{}",
                key,
                snapshot.poll_ms,
                interval.as_secs(),
                if changed { " (changed)" } else { "" }
            );
        } else {
            tracing::warn!(
                "Node {} unavailable ({} consecutive failure(s)), retrying in {}s: {}",
                key,
                failures,
                interval.as_secs(),
                snapshot.error.as_deref().unwrap_or("unknown error")
            );
        }

        if changed {
            let delta = delta::build_delta(key, &snapshot, previous.as_ref());
            self.publisher
                .publish(envelope("snapshot_delta", delta), channels::SNAPSHOT_DELTA)
                .await;
            self.metrics.record_delta(key);
        }

        if let Err(e) = self.sink.on_snapshot(&snapshot).await {
            tracing::warn!("Snapshot sink failed for node {}: {}", key, e);
        }
    }
}
