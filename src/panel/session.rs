// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Session pool for authenticated panel HTTP clients

use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::types::LoginResponse;
use crate::config::NodeDescriptor;
use crate::error::{AppError, Result};

/// Logged-in session, cheap to clone (`reqwest::Client` is reference counted)
#[derive(Clone)]
pub(super) struct PanelSession {
    pub client: reqwest::Client,
    pub base_url: String,
}

struct PooledSession {
    session: PanelSession,
    last_used: tokio::time::Instant,
}

/// Pool reusing cookie sessions across polls and aggregate queries
pub struct SessionPool {
    sessions: Arc<Mutex<HashMap<String, PooledSession>>>,
    request_timeout: Duration,
    max_idle_time: Duration,
}

/// Pool key: one session per node identity, address and user
fn session_key(node: &NodeDescriptor) -> String {
    format!(
        "{}@{}:{}:{}",
        node.key(),
        node.host,
        node.port,
        node.username
    )
}

impl SessionPool {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            request_timeout,
            max_idle_time: Duration::from_secs(300), // 5 minutes
        }
    }

    /// Get a cached session or log in and create one
    pub(super) async fn get_session(&self, node: &NodeDescriptor) -> Result<PanelSession> {
        let key = session_key(node);

        {
            let mut pool = self.sessions.lock().await;
            if let Some(pooled) = pool.get_mut(&key) {
                if pooled.last_used.elapsed() < self.max_idle_time {
                    tracing::trace!("Reusing panel session for {}", node.key());
                    pooled.last_used = tokio::time::Instant::now();
                    return Ok(pooled.session.clone());
                }
                tracing::debug!("Panel session expired for {}, removing", node.key());
                pool.remove(&key);
            }
        }

        tracing::debug!("Creating new panel session for {}", node.key());
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!node.verify_tls)
            .timeout(self.request_timeout)
            .build()?;
        let base_url = node.base_url();
        login(&client, &base_url, node).await?;

        let session = PanelSession { client, base_url };
        let mut pool = self.sessions.lock().await;
        pool.insert(
            key,
            PooledSession {
                session: session.clone(),
                last_used: tokio::time::Instant::now(),
            },
        );
        Ok(session)
    }

    /// Drop the session of a node so the next request logs in again
    pub(super) async fn invalidate(&self, node: &NodeDescriptor) {
        let mut pool = self.sessions.lock().await;
        if pool.remove(&session_key(node)).is_some() {
            tracing::debug!("Invalidated panel session for {}", node.key());
        }
    }

    /// Number of pooled sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clean up expired sessions
    pub async fn cleanup(&self) {
        let mut pool = self.sessions.lock().await;
        pool.retain(|key, pooled| {
            let should_keep = pooled.last_used.elapsed() < self.max_idle_time;
            if !should_keep {
                tracing::debug!("Cleaning up expired panel session: {}", key);
            }
            should_keep
        });
    }
}

/// Panel login.
///
/// `/panel/login` is tried first (installs under a sub-path); a 404 falls
/// back to the legacy `/login`.
async fn login(client: &reqwest::Client, base_url: &str, node: &NodeDescriptor) -> Result<()> {
    let form = [
        ("username", node.username.as_str()),
        ("password", node.password.as_str()),
    ];

    for path in ["/panel/login", "/login"] {
        let url = format!("{base_url}{path}");
        let resp = client.post(&url).form(&form).send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND && path == "/panel/login" {
            tracing::debug!("{} returned 404, trying legacy /login", url);
            continue;
        }

        if !status.is_success() {
            return Err(AppError::Panel(format!(
                "login at {url} returned HTTP {status}"
            )));
        }

        let body = resp.text().await?;
        if let Ok(answer) = serde_json::from_str::<LoginResponse>(&body) {
            if !answer.success {
                return Err(AppError::Panel(format!(
                    "login at {url} rejected: {}",
                    answer.msg
                )));
            }
        }

        tracing::debug!("Panel login succeeded at {}", url);
        return Ok(());
    }

    Err(AppError::Panel(format!(
        "no login endpoint found under {base_url}"
    )))
}
