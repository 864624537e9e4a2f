// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! High-level 3x-ui panel client

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::PanelClient;
use super::session::{PanelSession, SessionPool};
use super::types::{ApiResponse, Inbound, RawStatus, ServerStatus};
use crate::config::NodeDescriptor;
use crate::error::{AppError, Result};

/// 3x-ui panel API client
///
/// Logs in with the node credentials, keeps the cookie session in a shared
/// [`SessionPool`] and drops it whenever a request fails.
pub struct XuiPanelClient {
    sessions: Arc<SessionPool>,
}

impl XuiPanelClient {
    /// Creates a client whose requests time out after `request_timeout`
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self::with_pool(Arc::new(SessionPool::new(request_timeout)))
    }

    /// Creates a client with a shared session pool
    #[must_use]
    pub fn with_pool(sessions: Arc<SessionPool>) -> Self {
        Self { sessions }
    }

    /// Session pool, shared with the cleanup task
    #[must_use]
    pub fn sessions(&self) -> Arc<SessionPool> {
        self.sessions.clone()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        node: &NodeDescriptor,
        method: Method,
        path: &str,
    ) -> Result<Option<T>> {
        let session = self.sessions.get_session(node).await?;
        let result = request(&session, method, path).await;
        if let Err(e) = &result {
            tracing::debug!("Panel request {} failed for {}: {}", path, node.key(), e);
            self.sessions.invalidate(node).await;
        }
        result
    }
}

async fn request<T: DeserializeOwned>(
    session: &PanelSession,
    method: Method,
    path: &str,
) -> Result<Option<T>> {
    let url = format!("{}{}", session.base_url, path);
    let resp = session.client.request(method, &url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Panel(format!("{path} returned HTTP {status}")));
    }

    let body: ApiResponse<T> = resp.json().await?;
    if !body.success {
        return Err(AppError::Panel(format!(
            "{path} returned success=false: {}",
            body.msg
        )));
    }
    Ok(body.obj)
}

#[async_trait]
impl PanelClient for XuiPanelClient {
    async fn server_status(&self, node: &NodeDescriptor) -> Result<ServerStatus> {
        let raw: RawStatus = self
            .call(node, Method::GET, "/panel/api/server/status")
            .await?
            .ok_or_else(|| AppError::Panel("server status returned no payload".to_string()))?;
        Ok(raw.into())
    }

    async fn inbounds(&self, node: &NodeDescriptor) -> Result<Vec<Inbound>> {
        Ok(self
            .call(node, Method::GET, "/panel/api/inbounds/list")
            .await?
            .unwrap_or_default())
    }

    async fn online_clients(&self, node: &NodeDescriptor) -> Result<Vec<String>> {
        // `obj` is null when nobody is connected
        Ok(self
            .call(node, Method::POST, "/panel/api/inbounds/onlines")
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_node() -> NodeDescriptor {
        NodeDescriptor {
            id: Some(1),
            name: "unreachable".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
            base_path: String::new(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            verify_tls: false,
        }
    }

    #[tokio::test]
    async fn test_unreachable_panel_reports_error() {
        let client = XuiPanelClient::new(Duration::from_millis(200));
        let node = unreachable_node();

        assert!(client.server_status(&node).await.is_err());
        assert!(client.inbounds(&node).await.is_err());
        assert!(client.online_clients(&node).await.is_err());
        assert!(client.sessions().is_empty().await);
    }
}
