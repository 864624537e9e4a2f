use std::net::SocketAddr;
use std::sync::Arc;

use fleet_collector::{
    AppState, BroadcastHub, CompositeSink, Config, FileRegistry, FleetViews, HistoryStore,
    MetricsRegistry, NodeRegistry, Result, SnapshotCollector, StaticRegistry, XuiPanelClient,
    create_router, start_history_prune_task, start_live_updates_task, start_session_cleanup_task,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    setup_tracing();

    let config = Config::from_env();

    // Log configuration summary
    let registry: Arc<dyn NodeRegistry> = match &config.nodes_file {
        Some(path) => {
            tracing::info!("Reading node list from {}", path.display());
            Arc::new(FileRegistry::new(path.clone()))
        }
        None => {
            tracing::info!("Loaded configuration for {} node(s)", config.nodes.len());
            for node in &config.nodes {
                tracing::info!("  - Node '{}' at {}:{}", node.key(), node.host, node.port);
            }
            Arc::new(StaticRegistry::new(config.nodes.clone()))
        }
    };

    // Graceful shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    let metrics = MetricsRegistry::new();

    let panel = Arc::new(XuiPanelClient::new(config.panel_timeout));
    start_session_cleanup_task(panel.sessions(), shutdown_rx.clone());

    let hub = Arc::new(BroadcastHub::new().with_metrics(metrics.clone()));

    let history = Arc::new(HistoryStore::new(config.history.clone()));
    start_history_prune_task(history.clone(), shutdown_rx.clone());

    let views = Arc::new(
        FleetViews::new(
            registry.clone(),
            panel.clone(),
            config.cache.clone(),
            config.collector.max_parallel_polls,
        )
        .with_metrics(metrics.clone()),
    );

    let sink = CompositeSink::new()
        .with(Arc::new(metrics.clone()))
        .with(history.clone())
        .with(views.clone());

    let collector = Arc::new(SnapshotCollector::new(
        registry.clone(),
        panel.clone(),
        hub.clone(),
        Arc::new(sink),
        metrics.clone(),
        config.collector.clone(),
    ));
    collector.start(shutdown_rx.clone());

    start_live_updates_task(
        hub.clone(),
        collector.clone(),
        views.clone(),
        config.live_update_interval,
        shutdown_rx.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        metrics,
        registry,
        collector,
        views,
        hub,
        history,
    });

    let app = create_router(state);

    let addr: SocketAddr = config.server_addr.parse().map_err(|e| {
        tracing::error!("Invalid server address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind address: {}", e);
        e
    })?;

    tracing::info!("Fleet collector starting on {}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  - GET /health                        - Health check");
    tracing::info!("  - GET /metrics                       - Prometheus metrics");
    tracing::info!("  - GET /api/v1/snapshots/latest       - Latest node snapshots");
    tracing::info!("  - GET /api/v1/traffic/stats          - Aggregated traffic");
    tracing::info!("  - GET /api/v1/clients                - Client roster");
    tracing::info!("  - GET /api/v1/clients/online         - Online clients");
    tracing::info!("  - GET /api/v1/dashboard/summary      - Dashboard summary");
    tracing::info!("  - GET /api/v1/nodes/{{name}}/history   - Snapshot history");
    tracing::info!("  - GET /ws                            - Live updates");

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?;

    Ok(())
}

fn setup_tracing() {
    // RUST_LOG wins when set, otherwise default to "info"
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
