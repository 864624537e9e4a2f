// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Encoding and registry-level bookkeeping helpers

use crate::error::{AppError, Result};
use crate::metrics::labels::{CacheLabels, CacheNameLabels};
use prometheus_client::encoding::text::encode;
use std::time::Duration;

use super::MetricsRegistry;

impl MetricsRegistry {
    pub async fn encode_metrics(&self) -> Result<String> {
        let registry = self.registry.lock().await;
        let mut buffer = String::new();
        encode(&mut buffer, &registry).map_err(|e| AppError::Metrics(e.to_string()))?;
        Ok(buffer)
    }

    /// Record one scheduler tick: dispatch duration and known node count
    pub fn record_tick(&self, duration: Duration, nodes: usize) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        {
            self.collector_tick_duration_milliseconds
                .set(duration.as_millis() as i64);
            self.collector_nodes.set(nodes as i64);
        }
    }

    pub fn set_ws_subscribers(&self, count: usize) {
        #[allow(clippy::cast_possible_wrap)]
        self.ws_subscribers.set(count as i64);
    }

    pub fn record_cache_request(&self, cache: &str, outcome: &str) {
        self.cache_requests
            .get_or_create(&CacheLabels {
                cache: cache.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_cache_refresh_error(&self, cache: &str) {
        self.cache_refresh_errors
            .get_or_create(&CacheNameLabels {
                cache: cache.to_string(),
            })
            .inc();
    }
}
