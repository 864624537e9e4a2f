// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use async_trait::async_trait;
use axum::http::{Request, StatusCode};
use fleet_collector::{
    AppError, AppState, BroadcastHub, CacheConfig, ClientStat, CollectorConfig, CompositeSink,
    Config, FleetViews, HistoryConfig, HistoryStore, Inbound, MetricsRegistry, NodeDescriptor,
    NodeRegistry, PanelClient, Result, ServerStatus, SnapshotCollector, StaticRegistry,
    create_router,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn node(name: &str) -> NodeDescriptor {
    NodeDescriptor {
        id: None,
        name: name.to_string(),
        host: format!("{name}.example.net"),
        port: 2053,
        base_path: String::new(),
        username: "admin".to_string(),
        password: "secret".to_string(),
        verify_tls: false,
    }
}

/// Panel fake: every node serves the same two inbounds, nodes in `down` refuse connections
#[derive(Default)]
struct FakePanel {
    down: Mutex<HashSet<String>>,
}

impl FakePanel {
    fn with_down(names: &[&str]) -> Self {
        let panel = Self::default();
        panel
            .down
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        panel
    }

    fn check(&self, node: &NodeDescriptor) -> Result<()> {
        if self.down.lock().unwrap().contains(&node.name) {
            return Err(AppError::Panel("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PanelClient for FakePanel {
    async fn server_status(&self, node: &NodeDescriptor) -> Result<ServerStatus> {
        self.check(node)?;
        Ok(ServerStatus {
            cpu: 12.5,
            xray_state: "running".to_string(),
            ..ServerStatus::default()
        })
    }

    async fn inbounds(&self, node: &NodeDescriptor) -> Result<Vec<Inbound>> {
        self.check(node)?;
        Ok(vec![
            Inbound {
                id: 1,
                remark: "vless-main".to_string(),
                protocol: "vless".to_string(),
                up: 300,
                down: 800,
                settings: json!({
                    "clients": [
                        {"id": "c1", "email": "Alice@example.com"},
                        {"id": "c2", "email": "bob@example.com"}
                    ]
                }),
                client_stats: Some(vec![
                    ClientStat {
                        email: "Alice@example.com".to_string(),
                        up: 100,
                        down: 400,
                        enable: true,
                    },
                    ClientStat {
                        email: "bob@example.com".to_string(),
                        up: 200,
                        down: 400,
                        enable: true,
                    },
                ]),
                ..Inbound::default()
            },
            Inbound {
                id: 2,
                remark: "legacy".to_string(),
                protocol: "vmess".to_string(),
                up: 10,
                down: 20,
                ..Inbound::default()
            },
        ])
    }

    async fn online_clients(&self, node: &NodeDescriptor) -> Result<Vec<String>> {
        self.check(node)?;
        Ok(vec!["Alice@example.com".to_string()])
    }
}

struct TestApp {
    state: Arc<AppState>,
}

impl TestApp {
    fn new(names: &[&str], down: &[&str]) -> Self {
        let nodes: Vec<NodeDescriptor> = names.iter().map(|n| node(n)).collect();
        let config = Config {
            nodes: nodes.clone(),
            ..Config::default()
        };

        let registry: Arc<dyn NodeRegistry> = Arc::new(StaticRegistry::new(nodes));
        let panel: Arc<dyn PanelClient> = Arc::new(FakePanel::with_down(down));
        let metrics = MetricsRegistry::new();
        let hub = Arc::new(BroadcastHub::new().with_metrics(metrics.clone()));
        let history = Arc::new(HistoryStore::new(HistoryConfig::default()));
        let sink = CompositeSink::new()
            .with(Arc::new(metrics.clone()))
            .with(history.clone());

        let collector = Arc::new(SnapshotCollector::new(
            registry.clone(),
            panel.clone(),
            hub.clone(),
            Arc::new(sink),
            metrics.clone(),
            CollectorConfig::default(),
        ));
        let views = Arc::new(
            FleetViews::new(registry.clone(), panel, CacheConfig::default(), 4)
                .with_metrics(metrics.clone()),
        );

        TestApp {
            state: Arc::new(AppState {
                config,
                metrics,
                registry,
                collector,
                views,
                hub,
                history,
            }),
        }
    }

    /// Runs one scheduler tick and waits for every dispatched poll
    async fn poll_once(&self) {
        for handle in self.state.collector.tick().await {
            handle.await.unwrap();
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let resp = create_router(self.state.clone())
            .oneshot(Request::get(uri).body(String::new()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = String::from_utf8(
            resp.into_body()
                .collect()
                .await
                .unwrap()
                .to_bytes()
                .to_vec(),
        )
        .unwrap();
        (status, body)
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }
}

// --- /metrics endpoint ---

#[tokio::test]
async fn metrics_returns_200_with_openmetrics_content_type() {
    let app = TestApp::new(&["de-1"], &[]);

    let resp = create_router(app.state.clone())
        .oneshot(Request::get("/metrics").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(
        ct.contains("openmetrics-text"),
        "Expected OpenMetrics content-type, got: {ct}"
    );
}

#[tokio::test]
async fn metrics_contains_registered_metric_names() {
    let app = TestApp::new(&[], &[]);
    let (_, body) = app.get("/metrics").await;

    assert!(body.contains("fleet_collector_nodes"));
    assert!(body.contains("fleet_collector_tick_duration_milliseconds"));
    assert!(body.contains("fleet_ws_subscribers"));
}

#[tokio::test]
async fn metrics_contains_node_data_after_poll() {
    let app = TestApp::new(&["de-1"], &[]);
    app.poll_once().await;

    let (_, body) = app.get("/metrics").await;
    assert!(body.contains("node=\"de-1\""));
    assert!(body.contains("fleet_node_cpu_percent"));
    assert!(body.contains("fleet_poll_success_total{node=\"de-1\"} 1"));
}

// --- /health endpoint ---

#[tokio::test]
async fn health_returns_200_for_empty_config() {
    let app = TestApp::new(&[], &[]);
    let (status, health) = app.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["ws_subscribers"], 0);
    assert!(health["nodes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_open_websocket_connections() {
    let app = TestApp::new(&[], &[]);
    let first = app.state.hub.connect().await;
    let _second = app.state.hub.connect().await;

    let (_, health) = app.get_json("/health").await;
    assert_eq!(health["ws_subscribers"], 2);

    app.state.hub.disconnect(first.id).await;
    let (_, health) = app.get_json("/health").await;
    assert_eq!(health["ws_subscribers"], 1);
}

#[tokio::test]
async fn health_returns_unknown_before_first_poll() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, health) = app.get_json("/health").await;

    // Not polled yet: node "unknown", overall still healthy
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["nodes"][0]["name"], "de-1");
    assert_eq!(health["nodes"][0]["status"], "unknown");
}

#[tokio::test]
async fn health_multi_node_partial_degradation() {
    let app = TestApp::new(&["good", "bad"], &["bad"]);
    app.poll_once().await;

    let (status, health) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "degraded");

    let nodes = health["nodes"].as_array().unwrap();
    let good = nodes.iter().find(|n| n["name"] == "good").unwrap();
    let bad = nodes.iter().find(|n| n["name"] == "bad").unwrap();
    assert_eq!(good["status"], "healthy");
    assert_eq!(bad["status"], "degraded");
}

// --- /api/v1/snapshots/latest ---

#[tokio::test]
async fn latest_snapshots_empty_before_first_poll() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, latest) = app.get_json("/api/v1/snapshots/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["count"], 0);
    assert!(latest["timestamp"].is_null());
}

#[tokio::test]
async fn latest_snapshots_after_poll() {
    let app = TestApp::new(&["nl-1", "de-1"], &["nl-1"]);
    app.poll_once().await;

    let (status, latest) = app.get_json("/api/v1/snapshots/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["count"], 2);
    assert!(latest["timestamp"].as_f64().is_some());

    let nodes = latest["nodes"].as_array().unwrap();
    assert_eq!(nodes[0]["name"], "de-1");
    assert_eq!(nodes[0]["available"], true);
    assert_eq!(nodes[0]["online_clients"], 1);
    assert_eq!(nodes[0]["traffic_total"], 1130);
    assert_eq!(nodes[1]["name"], "nl-1");
    assert_eq!(nodes[1]["available"], false);
    assert!(nodes[1]["error"].as_str().unwrap().contains("connection refused"));
}

// --- cached views ---

#[tokio::test]
async fn traffic_stats_rejects_unknown_group() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, body) = app.get_json("/api/v1/traffic/stats?group_by=planet").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("group_by"));
}

#[tokio::test]
async fn traffic_stats_by_client_defaults() {
    let app = TestApp::new(&["de-1", "nl-1"], &[]);
    let (status, body) = app.get_json("/api/v1/traffic/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_by"], "client");
    let alice = &body["stats"]["Alice@example.com"];
    assert_eq!(alice["up"], 200);
    assert_eq!(alice["down"], 800);
    assert_eq!(alice["total"], 1000);
    assert_eq!(alice["count"], 2);
}

#[tokio::test]
async fn traffic_stats_by_node_includes_inbounds_without_client_stats() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, body) = app.get_json("/api/v1/traffic/stats?group_by=node").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["de-1"]["total"], 1130);
}

#[tokio::test]
async fn online_clients_skips_failing_nodes() {
    let app = TestApp::new(&["de-1", "nl-1"], &["nl-1"]);
    let (status, body) = app.get_json("/api/v1/clients/online").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["online_clients"][0]["email"], "Alice@example.com");
    assert_eq!(body["online_clients"][0]["node"], "de-1");
}

#[tokio::test]
async fn clients_email_filter_is_case_insensitive() {
    let app = TestApp::new(&["de-1"], &[]);

    let (_, all) = app.get_json("/api/v1/clients").await;
    assert_eq!(all["count"], 2);

    let (status, filtered) = app.get_json("/api/v1/clients?email=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["clients"][0]["email"], "Alice@example.com");
    assert_eq!(filtered["clients"][0]["node_name"], "de-1");
    assert_eq!(filtered["clients"][0]["inbound_remark"], "vless-main");
}

#[tokio::test]
async fn dashboard_summary_totals() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, summary) = app.get_json("/api/v1/dashboard/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["nodes_total"], 1);
    assert_eq!(summary["clients_total"], 2);
    assert_eq!(summary["online_clients_total"], 1);
    assert_eq!(summary["traffic"]["total"], 1100);
    assert_eq!(summary["top_clients"][0]["email"], "bob@example.com");
    assert_eq!(summary["top_clients"][1]["email"], "Alice@example.com");
}

// --- history ---

#[tokio::test]
async fn history_unknown_node_returns_404() {
    let app = TestApp::new(&["de-1"], &[]);
    let (status, body) = app.get_json("/api/v1/nodes/nowhere/history").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Node not found");
}

#[tokio::test]
async fn history_after_poll() {
    let app = TestApp::new(&["de-1"], &[]);
    app.poll_once().await;

    let (status, body) = app.get_json("/api/v1/nodes/de-1/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["node"], "de-1");
    assert_eq!(body["count"], 1);
    assert_eq!(body["points"][0]["available"], true);
    assert_eq!(body["points"][0]["cpu"], 12.5);
}

// --- 404 for unknown routes ---

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = TestApp::new(&[], &[]);
    let (status, _) = app.get("/unknown").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
