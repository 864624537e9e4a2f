// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Read-through caches with stale-while-revalidate
//!
//! A read inside `fresh` returns the cached value. A read between `fresh` and
//! `stale` returns the cached value and starts one background refresh for the
//! key. Anything older is recomputed before returning. An optional
//! [`DistributedCache`] is consulted first and written on every store. After a
//! local invalidation the shared tier is only read again for keys this cache
//! has rewritten since.

mod views;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::CacheTtl;
use crate::error::{AppError, Result};
use crate::metrics::MetricsRegistry;

pub use views::{
    ClientRecord, DashboardSummary, FleetViews, GroupBy, OnlineClient, TopClient, TrafficStats,
    TrafficTotals, TrafficSummary, aggregate_traffic,
};

/// Shared cache tier, e.g. a key-value server used by several replicas
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

struct CacheEntry<T> {
    fetched_at: Instant,
    payload: T,
}

/// Outcome labels exported in `fleet_cache_requests`
mod outcome {
    pub const FRESH: &str = "fresh";
    pub const STALE: &str = "stale";
    pub const MISS: &str = "miss";
    pub const SHARED: &str = "shared";
}

pub struct SwrCache<T> {
    name: String,
    ttl: CacheTtl,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    refreshing: Mutex<HashSet<String>>,
    distributed: Option<Arc<dyn DistributedCache>>,
    /// `Some` after an invalidation: keys rewritten to the shared tier since
    shared_rewritten: Mutex<Option<HashSet<String>>>,
    metrics: Option<MetricsRegistry>,
}

impl<T> SwrCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: impl Into<String>, ttl: CacheTtl) -> Self {
        Self {
            name: name.into(),
            ttl,
            entries: RwLock::new(HashMap::new()),
            refreshing: Mutex::new(HashSet::new()),
            distributed: None,
            shared_rewritten: Mutex::new(None),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_distributed(mut self, distributed: Arc<dyn DistributedCache>) -> Self {
        self.distributed = Some(distributed);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Return the value for `key`, computing it with `compute` when needed
    pub async fn get_or_compute<F, Fut>(self: &Arc<Self>, key: &str, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.read_distributed(key).await {
            self.record(outcome::SHARED);
            return Ok(value);
        }

        let cached = {
            let entries = self.entries.read().await;
            entries
                .get(key)
                .map(|e| (e.fetched_at.elapsed(), e.payload.clone()))
        };

        if let Some((age, payload)) = cached {
            if age < self.ttl.fresh {
                tracing::trace!("Cache {} fresh hit for {}", self.name, key);
                self.record(outcome::FRESH);
                return Ok(payload);
            }
            if age < self.ttl.stale {
                tracing::debug!(
                    "Cache {} serving stale {} ({:.1}s old)",
                    self.name,
                    key,
                    age.as_secs_f64()
                );
                self.record(outcome::STALE);
                self.spawn_refresh(key, compute).await;
                return Ok(payload);
            }
        }

        tracing::debug!("Cache {} miss for {}", self.name, key);
        self.record(outcome::MISS);
        let value = compute().await?;
        self.store(key, value.clone()).await;
        Ok(value)
    }

    /// Drop every local entry
    ///
    /// Shared entries written before this call are ignored from now on, so
    /// the next read of each key recomputes instead of returning them.
    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            tracing::debug!("Invalidated {} entries of cache {}", entries.len(), self.name);
        }
        entries.clear();
        if self.distributed.is_some() {
            *self.shared_rewritten.lock().await = Some(HashSet::new());
        }
    }

    #[cfg(test)]
    async fn is_refreshing(&self, key: &str) -> bool {
        self.refreshing.lock().await.contains(key)
    }

    async fn spawn_refresh<F, Fut>(self: &Arc<Self>, key: &str, compute: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        {
            let mut refreshing = self.refreshing.lock().await;
            if !refreshing.insert(key.to_string()) {
                tracing::trace!("Cache {} refresh for {} already running", self.name, key);
                return;
            }
        }

        let cache = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            // Run the computation in its own task so a panic still clears the flag
            let result = match tokio::spawn(compute()).await {
                Ok(result) => result,
                Err(e) => Err(AppError::Cache(format!("refresh task failed: {e}"))),
            };

            match result {
                Ok(value) => {
                    cache.store(&key, value).await;
                    tracing::debug!("Cache {} refreshed {}", cache.name, key);
                }
                Err(e) => {
                    tracing::warn!("Cache {} refresh failed for {}: {}", cache.name, key, e);
                    if let Some(metrics) = &cache.metrics {
                        metrics.record_cache_refresh_error(&cache.name);
                    }
                }
            }

            cache.refreshing.lock().await.remove(&key);
        });
    }

    async fn store(&self, key: &str, value: T) {
        if let Some(distributed) = &self.distributed {
            match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    match distributed
                        .set(&self.distributed_key(key), bytes, self.ttl.fresh)
                        .await
                    {
                        Ok(()) => {
                            if let Some(rewritten) = self.shared_rewritten.lock().await.as_mut() {
                                rewritten.insert(key.to_string());
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Distributed cache write failed for {}: {}", key, e);
                        }
                    }
                }
                Err(e) => tracing::warn!("Cannot serialize {} for distributed cache: {}", key, e),
            }
        }

        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                payload: value,
            },
        );
    }

    async fn read_distributed(&self, key: &str) -> Option<T> {
        let distributed = self.distributed.as_ref()?;
        let skip = self
            .shared_rewritten
            .lock()
            .await
            .as_ref()
            .is_some_and(|rewritten| !rewritten.contains(key));
        if skip {
            tracing::trace!("Skipping shared entry {} written before invalidation", key);
            return None;
        }
        match distributed.get(&self.distributed_key(key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Ignoring undecodable distributed entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Distributed cache unavailable for {}: {}", key, e);
                None
            }
        }
    }

    fn distributed_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_request(&self.name, outcome);
        }
    }
}
