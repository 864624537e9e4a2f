// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Per-node polling state and the adaptive interval policy

use std::time::Duration;
use tokio::time::Instant;

use crate::config::CollectorConfig;

/// Scheduling state of one node, owned by the collector
#[derive(Debug, Clone)]
pub struct PerNodeState {
    pub next_poll_at: Instant,
    pub interval: Duration,
    pub consecutive_failures: u32,
    pub consecutive_stable_cycles: u32,
    pub last_fingerprint: Option<String>,
    pub in_flight: bool,
}

impl PerNodeState {
    /// State for a node seen for the first time; it is due immediately
    #[must_use]
    pub fn new(now: Instant, config: &CollectorConfig) -> Self {
        Self {
            next_poll_at: now,
            interval: clamp_interval(config.base_interval, config),
            consecutive_failures: 0,
            consecutive_stable_cycles: 0,
            last_fingerprint: None,
            in_flight: false,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight && now >= self.next_poll_at
    }

    /// Apply a successful poll. Returns true when the content changed.
    pub fn record_success(
        &mut self,
        fingerprint: String,
        now: Instant,
        config: &CollectorConfig,
    ) -> bool {
        let changed = self.last_fingerprint.as_deref() != Some(fingerprint.as_str());
        if changed {
            self.consecutive_stable_cycles = 0;
        } else {
            self.consecutive_stable_cycles = self.consecutive_stable_cycles.saturating_add(1);
        }
        self.last_fingerprint = Some(fingerprint);
        self.consecutive_failures = 0;
        self.interval = success_interval(self.consecutive_stable_cycles, config);
        self.next_poll_at = now + self.interval;
        self.in_flight = false;
        changed
    }

    /// Apply a failed poll. The fingerprint is kept.
    pub fn record_failure(&mut self, now: Instant, config: &CollectorConfig) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_stable_cycles = 0;
        self.interval = failure_interval(self.consecutive_failures, config);
        self.next_poll_at = now + self.interval;
        self.in_flight = false;
    }
}

fn clamp_interval(interval: Duration, config: &CollectorConfig) -> Duration {
    interval.clamp(config.min_interval, config.max_interval)
}

/// `base * min(max_boost, 1 + stable / 3)`, clamped
#[must_use]
pub fn success_interval(stable_cycles: u32, config: &CollectorConfig) -> Duration {
    let boost = (1 + stable_cycles / 3).min(config.max_stability_boost.max(1));
    clamp_interval(config.base_interval.saturating_mul(boost), config)
}

/// `base * 2^min(failures, max_exponent)`, clamped
#[must_use]
pub fn failure_interval(failures: u32, config: &CollectorConfig) -> Duration {
    let exponent = failures.min(config.max_backoff_exponent);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    clamp_interval(config.base_interval.saturating_mul(factor), config)
}
