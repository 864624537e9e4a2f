// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Panel session cleanup task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::SessionPool;

/// Cleanup interval for expired sessions (60 seconds)
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Starts a background task that drops idle panel sessions every 60 seconds
pub fn start_session_cleanup_task(
    pool: Arc<SessionPool>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cleanup_ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cleanup_ticker.tick() => {
                    pool.cleanup().await;
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("Stopping panel session cleanup");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_task_respects_shutdown_signal() {
        let pool = Arc::new(SessionPool::new(Duration::from_secs(5)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = start_session_cleanup_task(pool.clone(), shutdown_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task should stop on shutdown")
            .unwrap();

        assert!(pool.is_empty().await);
    }

    #[test]
    fn test_cleanup_interval_constant_is_60_seconds() {
        assert_eq!(CLEANUP_INTERVAL, Duration::from_secs(60));
    }
}
