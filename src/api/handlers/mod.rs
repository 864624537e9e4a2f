// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

mod health;
mod history;
mod metrics;
mod snapshots;
mod views;
mod ws;

pub use health::{HealthResponse, NodeHealth, health_check};
pub use history::node_history;
pub use metrics::metrics_handler;
pub use snapshots::latest_snapshots;
pub use views::{clients, dashboard_summary, online_clients, traffic_stats};
pub use ws::ws_handler;
