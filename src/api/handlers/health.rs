use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;

/// Health of a single node, derived from its latest snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub name: String,
    /// `healthy`, `degraded`, or `unknown` before the first poll
    pub status: String,
}

/// Health check endpoint response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub collector_running: bool,
    /// Open WebSocket connections
    pub ws_subscribers: usize,
    pub nodes: Vec<NodeHealth>,
}

/// GET /health
///
/// Returns 503 when the last poll of any node failed. Nodes that were not
/// polled yet are reported as `unknown` and do not degrade the service.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut names: Vec<String> = match state.registry.list_nodes().await {
        Ok(nodes) => nodes.iter().map(|n| n.key()).collect(),
        Err(e) => {
            tracing::warn!("Health check could not read node registry: {}", e);
            state
                .collector
                .latest_snapshot()
                .await
                .nodes
                .into_iter()
                .map(|s| s.name)
                .collect()
        }
    };
    names.sort();
    names.dedup();

    let mut nodes = Vec::with_capacity(names.len());
    for name in names {
        let status = match state.collector.table().get(&name).await {
            Some(snapshot) if snapshot.available => "healthy",
            Some(_) => "degraded",
            None => "unknown",
        };
        nodes.push(NodeHealth {
            name,
            status: status.to_string(),
        });
    }

    let degraded = nodes.iter().any(|n| n.status == "degraded");
    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        collector_running: state.collector.is_running(),
        ws_subscribers: state.hub.subscriber_count().await,
        nodes,
    };

    let code = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(response))
}
