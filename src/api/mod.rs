//! HTTP API module for the fleet collector
//!
//! Read-only surface over the snapshot table, the cached views, the history
//! store and the metrics registry, plus the WebSocket fan-out.
//!
//! # Endpoints
//! - `GET /health` - health check
//! - `GET /metrics` - Prometheus metrics
//! - `GET /api/v1/snapshots/latest` - latest snapshot per node
//! - `GET /api/v1/traffic/stats?group_by=` - cached traffic totals
//! - `GET /api/v1/clients/online` - connected clients
//! - `GET /api/v1/clients?email=` - client roster
//! - `GET /api/v1/dashboard/summary` - fleet summary
//! - `GET /api/v1/nodes/{name}/history` - retained samples of a node
//! - `GET /ws` - real-time subscriptions

mod error;
pub mod handlers;
mod state;

use axum::{Router, routing::get};
use std::sync::Arc;

pub use state::AppState;

/// Creates the main Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/v1/snapshots/latest", get(handlers::latest_snapshots))
        .route("/api/v1/traffic/stats", get(handlers::traffic_stats))
        .route("/api/v1/clients/online", get(handlers::online_clients))
        .route("/api/v1/clients", get(handlers::clients))
        .route("/api/v1/dashboard/summary", get(handlers::dashboard_summary))
        .route("/api/v1/nodes/{name}/history", get(handlers::node_history))
        .route("/ws", get(handlers::ws_handler))
        .with_state(state)
}
