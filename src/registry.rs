// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Node registry: the source of truth for which panels are polled

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::{NodeDescriptor, parse_nodes};
use crate::error::{AppError, Result};

/// Supplies the current node list. Read once per scheduler tick.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>>;
}

/// Fixed node list taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    nodes: Vec<NodeDescriptor>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeRegistry for StaticRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>> {
        Ok(self.nodes.clone())
    }
}

/// JSON file re-read on every call, so nodes can be added and removed at runtime
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NodeRegistry for FileRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::Registry(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let nodes = parse_nodes(&raw)
            .map_err(|e| AppError::Registry(format!("invalid {}: {}", self.path.display(), e)))?;
        tracing::trace!(
            "Loaded {} node(s) from {}",
            nodes.len(),
            self.path.display()
        );
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "fleet-collector-registry-{}-{}.json",
            tag,
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn test_static_registry_returns_configured_nodes() {
        let node = NodeDescriptor {
            id: Some(1),
            name: "edge".to_string(),
            host: "10.0.0.1".to_string(),
            port: 443,
            base_path: String::new(),
            username: "admin".to_string(),
            password: String::new(),
            verify_tls: false,
        };
        let registry = StaticRegistry::new(vec![node.clone()]);
        assert_eq!(registry.list_nodes().await.unwrap(), vec![node]);
    }

    #[tokio::test]
    async fn test_file_registry_rereads_file() {
        let path = temp_path("reread");
        tokio::fs::write(
            &path,
            r#"[{"name": "a", "host": "10.0.0.1", "port": 443, "username": "u"}]"#,
        )
        .await
        .unwrap();

        let registry = FileRegistry::new(&path);
        assert_eq!(registry.list_nodes().await.unwrap().len(), 1);

        tokio::fs::write(&path, "[]").await.unwrap();
        assert!(registry.list_nodes().await.unwrap().is_empty());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_registry_missing_file_is_registry_error() {
        let registry = FileRegistry::new(temp_path("missing-never-created"));
        let err = registry.list_nodes().await.unwrap_err();
        assert!(matches!(err, AppError::Registry(_)));
    }

    #[tokio::test]
    async fn test_file_registry_invalid_json_is_registry_error() {
        let path = temp_path("invalid");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = FileRegistry::new(&path).list_nodes().await.unwrap_err();
        assert!(matches!(err, AppError::Registry(_)));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
