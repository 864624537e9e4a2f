// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Fleet-wide aggregate views served through the caches

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{CacheConfig, NodeDescriptor};
use crate::error::Result;
use crate::metrics::MetricsRegistry;
use crate::panel::{Inbound, PanelClient};
use crate::registry::NodeRegistry;
use crate::sink::SnapshotSink;
use crate::snapshot::Snapshot;

use super::{DistributedCache, SwrCache};

/// Number of entries in the dashboard's top client list
const TOP_CLIENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Client,
    Inbound,
    Node,
}

impl GroupBy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Client => "client",
            GroupBy::Inbound => "inbound",
            GroupBy::Node => "node",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "client" => Ok(GroupBy::Client),
            "inbound" => Ok(GroupBy::Inbound),
            "node" => Ok(GroupBy::Node),
            _ => Err("group_by must be client, inbound, or node".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTotals {
    pub up: u64,
    pub down: u64,
    pub total: u64,
    pub count: u64,
}

impl TrafficTotals {
    fn add(&mut self, up: u64, down: u64) {
        self.up = self.up.saturating_add(up);
        self.down = self.down.saturating_add(down);
        self.total = self.up.saturating_add(self.down);
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub group_by: GroupBy,
    pub stats: BTreeMap<String, TrafficTotals>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineClient {
    pub email: String,
    pub node: String,
}

/// One configured client, flattened with its node and inbound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Option<String>,
    pub email: String,
    pub enable: bool,
    pub expiry_time: i64,
    pub total_gb: i64,
    pub flow: String,
    pub node_name: String,
    pub node_host: String,
    pub inbound_id: i64,
    pub inbound_remark: String,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopClient {
    pub email: String,
    pub upload: u64,
    pub download: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSummary {
    pub upload: u64,
    pub download: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub nodes_total: usize,
    pub clients_total: usize,
    pub online_clients_total: usize,
    pub traffic: TrafficSummary,
    pub top_clients: Vec<TopClient>,
}

/// Sum traffic per group.
///
/// Per-client stats are used when the panel reports them. Inbounds without
/// client stats contribute their own totals, except when grouping by client.
#[must_use]
pub fn aggregate_traffic(group_by: GroupBy, nodes: &[(NodeDescriptor, Vec<Inbound>)]) -> TrafficStats {
    let mut stats: BTreeMap<String, TrafficTotals> = BTreeMap::new();

    for (node, inbounds) in nodes {
        let node_name = node.key();
        for inbound in inbounds {
            let key_for = |email: &str| match group_by {
                GroupBy::Client => email.to_string(),
                GroupBy::Inbound => format!("{}:{}", node_name, inbound.label()),
                GroupBy::Node => node_name.clone(),
            };

            match &inbound.client_stats {
                Some(client_stats) => {
                    for stat in client_stats {
                        stats
                            .entry(key_for(&stat.email))
                            .or_default()
                            .add(stat.up, stat.down);
                    }
                }
                None if group_by != GroupBy::Client => {
                    stats
                        .entry(key_for(""))
                        .or_default()
                        .add(inbound.up, inbound.down);
                }
                None => {}
            }
        }
    }

    TrafficStats { group_by, stats }
}

fn summarize(nodes_total: usize, traffic: &TrafficStats, online_total: usize) -> DashboardSummary {
    let mut summary = TrafficSummary::default();
    let mut top_clients: Vec<TopClient> = Vec::with_capacity(traffic.stats.len());

    for (email, totals) in &traffic.stats {
        summary.upload = summary.upload.saturating_add(totals.up);
        summary.download = summary.download.saturating_add(totals.down);
        top_clients.push(TopClient {
            email: email.clone(),
            upload: totals.up,
            download: totals.down,
            total: totals.total,
        });
    }
    summary.total = summary.upload.saturating_add(summary.download);

    top_clients.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.email.cmp(&b.email)));
    top_clients.truncate(TOP_CLIENTS);

    DashboardSummary {
        nodes_total,
        clients_total: traffic.stats.len(),
        online_clients_total: online_total,
        traffic: summary,
        top_clients,
    }
}

fn client_records(nodes: &[(NodeDescriptor, Vec<Inbound>)]) -> Vec<ClientRecord> {
    let mut records = Vec::new();
    for (node, inbounds) in nodes {
        for inbound in inbounds {
            for client in inbound.clients() {
                records.push(ClientRecord {
                    id: client.id,
                    email: client.email,
                    enable: client.enable,
                    expiry_time: client.expiry_time,
                    total_gb: client.total_gb,
                    flow: client.flow,
                    node_name: node.key(),
                    node_host: node.host.clone(),
                    inbound_id: inbound.id,
                    inbound_remark: inbound.remark.clone(),
                    protocol: inbound.protocol.clone(),
                });
            }
        }
    }
    records
}

/// Inbounds of every registered node; failing nodes are logged and skipped
async fn fetch_inbounds(
    registry: &dyn NodeRegistry,
    panel: &Arc<dyn PanelClient>,
    parallelism: usize,
) -> Result<Vec<(NodeDescriptor, Vec<Inbound>)>> {
    let nodes = registry.list_nodes().await?;
    let mut results: Vec<(NodeDescriptor, Vec<Inbound>)> = stream::iter(nodes)
        .map(|node| {
            let panel = Arc::clone(panel);
            async move {
                let result = panel.inbounds(&node).await;
                (node, result)
            }
        })
        .buffer_unordered(parallelism.max(1))
        .filter_map(|(node, result)| async move {
            match result {
                Ok(inbounds) => Some((node, inbounds)),
                Err(e) => {
                    tracing::warn!("Failed to get inbounds from {}: {}", node.key(), e);
                    None
                }
            }
        })
        .collect()
        .await;
    results.sort_by_key(|(node, _)| node.key());
    Ok(results)
}

async fn fetch_online(
    registry: &dyn NodeRegistry,
    panel: &Arc<dyn PanelClient>,
    parallelism: usize,
) -> Result<Vec<OnlineClient>> {
    let nodes = registry.list_nodes().await?;
    let mut per_node: Vec<(String, Vec<String>)> = stream::iter(nodes)
        .map(|node| {
            let panel = Arc::clone(panel);
            async move {
                let result = panel.online_clients(&node).await;
                (node, result)
            }
        })
        .buffer_unordered(parallelism.max(1))
        .filter_map(|(node, result)| async move {
            match result {
                Ok(emails) => Some((node.key(), emails)),
                Err(e) => {
                    tracing::warn!("Failed to get online clients from {}: {}", node.key(), e);
                    None
                }
            }
        })
        .collect()
        .await;
    per_node.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(per_node
        .into_iter()
        .flat_map(|(node, emails)| {
            emails.into_iter().map(move |email| OnlineClient {
                email,
                node: node.clone(),
            })
        })
        .collect())
}

/// Cached aggregate queries over the whole fleet
pub struct FleetViews {
    registry: Arc<dyn NodeRegistry>,
    panel: Arc<dyn PanelClient>,
    parallelism: usize,
    config: CacheConfig,
    metrics: Option<MetricsRegistry>,
    distributed: Option<Arc<dyn DistributedCache>>,
    traffic: Arc<SwrCache<TrafficStats>>,
    online: Arc<SwrCache<Vec<OnlineClient>>>,
    clients: Arc<SwrCache<Vec<ClientRecord>>>,
}

impl FleetViews {
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        panel: Arc<dyn PanelClient>,
        config: CacheConfig,
        parallelism: usize,
    ) -> Self {
        let mut views = Self {
            registry,
            panel,
            parallelism: parallelism.max(1),
            traffic: Arc::new(SwrCache::new("traffic", config.traffic)),
            online: Arc::new(SwrCache::new("online", config.online)),
            clients: Arc::new(SwrCache::new("clients", config.clients)),
            config,
            metrics: None,
            distributed: None,
        };
        views.build_caches();
        views
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self.build_caches();
        self
    }

    #[must_use]
    pub fn with_distributed(mut self, distributed: Arc<dyn DistributedCache>) -> Self {
        self.distributed = Some(distributed);
        self.build_caches();
        self
    }

    fn build_caches(&mut self) {
        self.traffic = Arc::new(self.cache("traffic", self.config.traffic));
        self.online = Arc::new(self.cache("online", self.config.online));
        self.clients = Arc::new(self.cache("clients", self.config.clients));
    }

    fn cache<T>(&self, name: &str, ttl: crate::config::CacheTtl) -> SwrCache<T>
    where
        T: Clone + Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let mut cache = SwrCache::new(name, ttl);
        if let Some(metrics) = &self.metrics {
            cache = cache.with_metrics(metrics.clone());
        }
        if let Some(distributed) = &self.distributed {
            cache = cache.with_distributed(Arc::clone(distributed));
        }
        cache
    }

    pub async fn traffic_stats(&self, group_by: GroupBy) -> Result<TrafficStats> {
        let registry = Arc::clone(&self.registry);
        let panel = Arc::clone(&self.panel);
        let parallelism = self.parallelism;
        self.traffic
            .get_or_compute(group_by.as_str(), move || async move {
                let inbounds = fetch_inbounds(registry.as_ref(), &panel, parallelism).await?;
                Ok(aggregate_traffic(group_by, &inbounds))
            })
            .await
    }

    pub async fn online_clients(&self) -> Result<Vec<OnlineClient>> {
        let registry = Arc::clone(&self.registry);
        let panel = Arc::clone(&self.panel);
        let parallelism = self.parallelism;
        self.online
            .get_or_compute("all", move || async move {
                fetch_online(registry.as_ref(), &panel, parallelism).await
            })
            .await
    }

    pub async fn clients(&self) -> Result<Vec<ClientRecord>> {
        let registry = Arc::clone(&self.registry);
        let panel = Arc::clone(&self.panel);
        let parallelism = self.parallelism;
        self.clients
            .get_or_compute("all", move || async move {
                let inbounds = fetch_inbounds(registry.as_ref(), &panel, parallelism).await?;
                Ok(client_records(&inbounds))
            })
            .await
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let nodes_total = self.registry.list_nodes().await?.len();
        let traffic = self.traffic_stats(GroupBy::Client).await?;
        let online = self.online_clients().await?;
        Ok(summarize(nodes_total, &traffic, online.len()))
    }

    /// Clear every cache, e.g. after the node set changed
    pub async fn invalidate(&self) {
        self.traffic.invalidate().await;
        self.online.invalidate().await;
        self.clients.invalidate().await;
    }
}

/// Views follow the node set: a node leaving the registry drops every cached
/// aggregate that still counts it.
#[async_trait]
impl SnapshotSink for FleetViews {
    async fn on_snapshot(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    async fn on_node_removed(&self, node: &str) {
        tracing::debug!("Node {} removed, invalidating fleet views", node);
        self.invalidate().await;
    }
}
