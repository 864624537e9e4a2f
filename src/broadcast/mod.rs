// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Broadcast fan-out to real-time subscribers
//!
//! Every subscriber owns a bounded outbound queue and a set of channels.
//! Publishing serializes the message once and hands it to every subscriber of
//! the channel; subscribers whose receiving side is gone are dropped.

mod updates;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};

use crate::metrics::MetricsRegistry;
use crate::snapshot::unix_now;

pub use updates::start_live_updates_task;

/// Channel names used by the collector and the live update task
pub mod channels {
    pub const SNAPSHOT_DELTA: &str = "snapshot_delta";
    pub const SERVER_STATUS: &str = "server_status";
    pub const TRAFFIC: &str = "traffic";
}

/// Outbound queue length per subscriber
pub const SUBSCRIBER_QUEUE_SIZE: usize = 64;

/// Fire-and-forget publication to the subscribers of a channel
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: Value, channel: &str);
}

/// `{type, data, timestamp}` message envelope
#[must_use]
pub fn envelope(kind: &str, data: Value) -> Value {
    json!({
        "type": kind,
        "data": data,
        "timestamp": unix_now(),
    })
}

struct Subscriber {
    channels: HashSet<String>,
    tx: mpsc::Sender<Arc<str>>,
}

/// Receiving side handed to a connection
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// In-process fan-out hub
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    queue_size: usize,
    metrics: Option<MetricsRegistry>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_size: SUBSCRIBER_QUEUE_SIZE,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Export the subscriber count as a gauge
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a new subscriber with no channels
    pub async fn connect(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_size);
        let count = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(
                id,
                Subscriber {
                    channels: HashSet::new(),
                    tx,
                },
            );
            subscribers.len()
        };
        tracing::info!("New subscriber {}. Total: {}", id, count);
        self.export_count(count);
        Subscription { id, rx }
    }

    pub async fn disconnect(&self, id: u64) {
        let count = {
            let mut subscribers = self.subscribers.write().await;
            if subscribers.remove(&id).is_none() {
                return;
            }
            subscribers.len()
        };
        tracing::info!("Subscriber {} disconnected. Total: {}", id, count);
        self.export_count(count);
    }

    /// Add a channel to a subscriber; false if the subscriber is unknown
    pub async fn subscribe(&self, id: u64, channel: &str) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.channels.insert(channel.to_string());
                tracing::debug!("Subscriber {} subscribed to {}", id, channel);
                true
            }
            None => false,
        }
    }

    pub async fn unsubscribe(&self, id: u64, channel: &str) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.channels.remove(channel);
                tracing::debug!("Subscriber {} unsubscribed from {}", id, channel);
                true
            }
            None => false,
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Whether anyone currently listens on `channel`
    pub async fn has_subscribers(&self, channel: &str) -> bool {
        self.subscribers
            .read()
            .await
            .values()
            .any(|s| s.channels.contains(channel))
    }

    /// Deliver a message to every subscriber of `channel`.
    ///
    /// Returns the number of queues the message was placed in. Closed queues
    /// are removed; a full queue loses this message only.
    pub async fn broadcast(&self, message: &Value, channel: &str) -> usize {
        let text: Arc<str> = match serde_json::to_string(message) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                tracing::error!("Failed to serialize {} message: {}", channel, e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.channels.contains(channel) {
                    continue;
                }
                match subscriber.tx.try_send(text.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            "Subscriber {} is lagging, dropping {} message",
                            id,
                            channel
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let count = {
                let mut subscribers = self.subscribers.write().await;
                for id in &dead {
                    subscribers.remove(id);
                }
                subscribers.len()
            };
            tracing::debug!("Removed {} closed subscriber(s)", dead.len());
            self.export_count(count);
        }

        tracing::trace!("Broadcast on {} reached {} subscriber(s)", channel, delivered);
        delivered
    }

    fn export_count(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_ws_subscribers(count);
        }
    }
}

#[async_trait]
impl Publisher for BroadcastHub {
    async fn publish(&self, message: Value, channel: &str) {
        self.broadcast(&message, channel).await;
    }
}
