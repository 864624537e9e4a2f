// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Configuration module for the fleet collector
//!
//! Loads and parses configuration from environment variables and JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;


/// Default configuration values
pub mod defaults {
    pub const SERVER_ADDR: &str = "127.0.0.1:9090";
    pub const BASE_INTERVAL_SECS: u64 = 5;
    pub const MAX_INTERVAL_SECS: u64 = 60;
    pub const MIN_INTERVAL_SECS: u64 = 3;
    pub const MAX_PARALLEL_POLLS: u64 = 8;
    pub const POLL_TIMEOUT_SECS: u64 = 30;
    pub const MAX_STABILITY_BOOST: u64 = 4;
    pub const MAX_BACKOFF_EXPONENT: u64 = 4;
    pub const TRAFFIC_FRESH_TTL_SECS: u64 = 10;
    pub const TRAFFIC_STALE_TTL_SECS: u64 = 120;
    pub const ONLINE_FRESH_TTL_SECS: u64 = 5;
    pub const ONLINE_STALE_TTL_SECS: u64 = 60;
    pub const CLIENTS_FRESH_TTL_SECS: u64 = 30;
    pub const CLIENTS_STALE_TTL_SECS: u64 = 300;
    pub const HISTORY_MIN_INTERVAL_SECS: u64 = 30;
    pub const HISTORY_RETENTION_SECS: u64 = 86_400;
    pub const HISTORY_PRUNE_INTERVAL_SECS: u64 = 300;
    pub const LIVE_UPDATE_INTERVAL_SECS: u64 = 5;
    pub const PANEL_TIMEOUT_SECS: u64 = 5;
}

/// Environment variable names used by the application
pub mod env_vars {
    pub const SERVER_ADDR: &str = "SERVER_ADDR";
    pub const NODES_CONFIG: &str = "NODES_CONFIG";
    pub const NODES_FILE: &str = "NODES_FILE";
    pub const BASE_INTERVAL: &str = "COLLECTOR_BASE_INTERVAL_SEC";
    pub const MAX_INTERVAL: &str = "COLLECTOR_MAX_INTERVAL_SEC";
    pub const MIN_INTERVAL: &str = "COLLECTOR_MIN_INTERVAL_SEC";
    pub const MAX_PARALLEL_POLLS: &str = "COLLECTOR_MAX_PARALLEL_POLLS";
    pub const POLL_TIMEOUT: &str = "COLLECTOR_POLL_TIMEOUT_SEC";
    pub const MAX_STABILITY_BOOST: &str = "COLLECTOR_MAX_STABILITY_BOOST";
    pub const MAX_BACKOFF_EXPONENT: &str = "COLLECTOR_MAX_BACKOFF_EXPONENT";
    pub const TRAFFIC_FRESH_TTL: &str = "TRAFFIC_CACHE_FRESH_TTL_SEC";
    pub const TRAFFIC_STALE_TTL: &str = "TRAFFIC_CACHE_STALE_TTL_SEC";
    pub const ONLINE_FRESH_TTL: &str = "ONLINE_CACHE_FRESH_TTL_SEC";
    pub const ONLINE_STALE_TTL: &str = "ONLINE_CACHE_STALE_TTL_SEC";
    pub const CLIENTS_FRESH_TTL: &str = "CLIENTS_CACHE_FRESH_TTL_SEC";
    pub const CLIENTS_STALE_TTL: &str = "CLIENTS_CACHE_STALE_TTL_SEC";
    pub const HISTORY_MIN_INTERVAL: &str = "HISTORY_MIN_INTERVAL_SEC";
    pub const HISTORY_RETENTION: &str = "HISTORY_RETENTION_SEC";
    pub const HISTORY_PRUNE_INTERVAL: &str = "HISTORY_PRUNE_INTERVAL_SEC";
    pub const LIVE_UPDATE_INTERVAL: &str = "LIVE_UPDATE_INTERVAL_SEC";
    pub const PANEL_TIMEOUT: &str = "PANEL_TIMEOUT_SEC";
}

/// Connection descriptor for a single panel node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "ip")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub base_path: String,
    #[serde(alias = "user")]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub verify_tls: bool,
}

impl NodeDescriptor {
    /// Identity key used by the collector, the snapshot table and metric labels.
    ///
    /// The display name wins; nodes without a name fall back to their id.
    #[must_use]
    pub fn key(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    /// Panel base URL, `https://host:port[/base_path]`
    #[must_use]
    pub fn base_url(&self) -> String {
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            format!("https://{}:{}", self.host, self.port)
        } else {
            format!("https://{}:{}/{}", self.host, self.port, path)
        }
    }

    /// Validates node configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.key().is_empty() {
            return Err("Node must have a name or an id".to_string());
        }

        if self.host.trim().is_empty() {
            return Err(format!("Host cannot be empty for node '{}'", self.key()));
        }

        if self.port == 0 {
            return Err(format!("Port cannot be 0 for node '{}'", self.key()));
        }

        if self.username.trim().is_empty() {
            return Err(format!(
                "Username cannot be empty for node '{}'",
                self.key()
            ));
        }

        Ok(())
    }
}

/// Polling scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub min_interval: Duration,
    pub max_parallel_polls: usize,
    pub poll_timeout: Duration,
    pub max_stability_boost: u32,
    pub max_backoff_exponent: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            base_interval: Duration::from_secs(defaults::BASE_INTERVAL_SECS),
            max_interval: Duration::from_secs(defaults::MAX_INTERVAL_SECS),
            min_interval: Duration::from_secs(defaults::MIN_INTERVAL_SECS),
            max_parallel_polls: defaults::MAX_PARALLEL_POLLS as usize,
            poll_timeout: Duration::from_secs(defaults::POLL_TIMEOUT_SECS),
            max_stability_boost: defaults::MAX_STABILITY_BOOST as u32,
            max_backoff_exponent: defaults::MAX_BACKOFF_EXPONENT as u32,
        }
    }
}

impl CollectorConfig {
    /// Applies the lower bounds every interval must respect.
    ///
    /// Base and min are at least one second, max is raised to cover both so
    /// that `[min, max]` is never empty.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let one = Duration::from_secs(1);
        self.base_interval = self.base_interval.max(one);
        self.min_interval = self.min_interval.max(one);
        self.max_interval = self
            .max_interval
            .max(self.base_interval)
            .max(self.min_interval);
        self.max_parallel_polls = self.max_parallel_polls.max(1);
        self.poll_timeout = self.poll_timeout.max(one);
        self.max_stability_boost = self.max_stability_boost.max(1);
        // 2^31 is the largest multiplier a u32 can hold
        self.max_backoff_exponent = self.max_backoff_exponent.min(31);
        self
    }
}

/// Fresh and stale lifetimes of one cache class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub fresh: Duration,
    pub stale: Duration,
}

impl CacheTtl {
    #[must_use]
    pub fn from_secs(fresh: u64, stale: u64) -> Self {
        let fresh = Duration::from_secs(fresh);
        Self {
            fresh,
            stale: Duration::from_secs(stale).max(fresh),
        }
    }
}

/// TTLs of the aggregate view caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub traffic: CacheTtl,
    pub online: CacheTtl,
    pub clients: CacheTtl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            traffic: CacheTtl::from_secs(
                defaults::TRAFFIC_FRESH_TTL_SECS,
                defaults::TRAFFIC_STALE_TTL_SECS,
            ),
            online: CacheTtl::from_secs(
                defaults::ONLINE_FRESH_TTL_SECS,
                defaults::ONLINE_STALE_TTL_SECS,
            ),
            clients: CacheTtl::from_secs(
                defaults::CLIENTS_FRESH_TTL_SECS,
                defaults::CLIENTS_STALE_TTL_SECS,
            ),
        }
    }
}

/// Snapshot history retention settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub min_interval: Duration,
    pub retention: Duration,
    pub prune_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            min_interval: Duration::from_secs(defaults::HISTORY_MIN_INTERVAL_SECS),
            retention: Duration::from_secs(defaults::HISTORY_RETENTION_SECS),
            prune_interval: Duration::from_secs(defaults::HISTORY_PRUNE_INTERVAL_SECS),
        }
    }
}

/// Application-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub nodes: Vec<NodeDescriptor>,
    pub nodes_file: Option<PathBuf>,
    pub collector: CollectorConfig,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
    pub live_update_interval: Duration,
    pub panel_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: defaults::SERVER_ADDR.to_string(),
            nodes: vec![],
            nodes_file: None,
            collector: CollectorConfig::default(),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            live_update_interval: Duration::from_secs(defaults::LIVE_UPDATE_INTERVAL_SECS),
            panel_timeout: Duration::from_secs(defaults::PANEL_TIMEOUT_SECS),
        }
    }
}

/// Reads an integer variable, falling back to `default` when unset or invalid
fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<u64>().unwrap_or_else(|e| {
            tracing::warn!("Invalid value '{}' for {}: {}. Using {}.", raw, name, e, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(name, default))
}

/// Parses a JSON array of node descriptors, dropping entries that fail validation
pub fn parse_nodes(json: &str) -> Result<Vec<NodeDescriptor>, serde_json::Error> {
    let nodes: Vec<NodeDescriptor> = serde_json::from_str(json)?;
    Ok(nodes
        .into_iter()
        .filter(|node| match node.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Invalid node configuration: {}", e);
                tracing::warn!("Skipping invalid node: {}", node.key());
                false
            }
        })
        .collect())
}

impl Config {
    /// Loads configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let server_addr = std::env::var(env_vars::SERVER_ADDR)
            .unwrap_or_else(|_| defaults::SERVER_ADDR.to_string());

        let nodes = match std::env::var(env_vars::NODES_CONFIG) {
            Ok(config_json) => parse_nodes(&config_json).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse NODES_CONFIG: {}. Using empty list.", e);
                vec![]
            }),
            Err(_) => vec![],
        };

        let nodes_file = std::env::var(env_vars::NODES_FILE)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        if nodes.is_empty() && nodes_file.is_none() {
            tracing::warn!(
                "No node configuration found. Service will start but snapshots will be empty."
            );
        }

        let collector = CollectorConfig {
            base_interval: env_secs(env_vars::BASE_INTERVAL, defaults::BASE_INTERVAL_SECS),
            max_interval: env_secs(env_vars::MAX_INTERVAL, defaults::MAX_INTERVAL_SECS),
            min_interval: env_secs(env_vars::MIN_INTERVAL, defaults::MIN_INTERVAL_SECS),
            max_parallel_polls: env_u64(
                env_vars::MAX_PARALLEL_POLLS,
                defaults::MAX_PARALLEL_POLLS,
            ) as usize,
            poll_timeout: env_secs(env_vars::POLL_TIMEOUT, defaults::POLL_TIMEOUT_SECS),
            max_stability_boost: u32::try_from(env_u64(
                env_vars::MAX_STABILITY_BOOST,
                defaults::MAX_STABILITY_BOOST,
            ))
            .unwrap_or(u32::MAX),
            max_backoff_exponent: u32::try_from(env_u64(
                env_vars::MAX_BACKOFF_EXPONENT,
                defaults::MAX_BACKOFF_EXPONENT,
            ))
            .unwrap_or(u32::MAX),
        }
        .normalized();

        let cache = CacheConfig {
            traffic: CacheTtl::from_secs(
                env_u64(env_vars::TRAFFIC_FRESH_TTL, defaults::TRAFFIC_FRESH_TTL_SECS),
                env_u64(env_vars::TRAFFIC_STALE_TTL, defaults::TRAFFIC_STALE_TTL_SECS),
            ),
            online: CacheTtl::from_secs(
                env_u64(env_vars::ONLINE_FRESH_TTL, defaults::ONLINE_FRESH_TTL_SECS),
                env_u64(env_vars::ONLINE_STALE_TTL, defaults::ONLINE_STALE_TTL_SECS),
            ),
            clients: CacheTtl::from_secs(
                env_u64(env_vars::CLIENTS_FRESH_TTL, defaults::CLIENTS_FRESH_TTL_SECS),
                env_u64(env_vars::CLIENTS_STALE_TTL, defaults::CLIENTS_STALE_TTL_SECS),
            ),
        };

        let history = HistoryConfig {
            min_interval: env_secs(
                env_vars::HISTORY_MIN_INTERVAL,
                defaults::HISTORY_MIN_INTERVAL_SECS,
            ),
            retention: env_secs(env_vars::HISTORY_RETENTION, defaults::HISTORY_RETENTION_SECS),
            prune_interval: env_secs(
                env_vars::HISTORY_PRUNE_INTERVAL,
                defaults::HISTORY_PRUNE_INTERVAL_SECS,
            )
            .max(Duration::from_secs(1)),
        };

        Config {
            server_addr,
            nodes,
            nodes_file,
            collector,
            cache,
            history,
            live_update_interval: env_secs(
                env_vars::LIVE_UPDATE_INTERVAL,
                defaults::LIVE_UPDATE_INTERVAL_SECS,
            )
            .max(Duration::from_secs(1)),
            panel_timeout: env_secs(env_vars::PANEL_TIMEOUT, defaults::PANEL_TIMEOUT_SECS)
                .max(Duration::from_secs(1)),
        }
    }
}
