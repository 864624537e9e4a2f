// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Panel API client module
//!
//! The collector and the aggregate views only see the [`PanelClient`] trait;
//! [`XuiPanelClient`] is the 3x-ui implementation used by the binary.

mod cleanup;
mod client;
mod session;
mod types;

use async_trait::async_trait;

use crate::config::NodeDescriptor;
use crate::error::Result;

pub use cleanup::start_session_cleanup_task;
pub use client::XuiPanelClient;
pub use session::SessionPool;
pub use types::{ClientStat, Inbound, InboundClient, ServerStatus};

/// Point-in-time facts about one panel node
#[async_trait]
pub trait PanelClient: Send + Sync {
    /// CPU, memory and Xray process state
    async fn server_status(&self, node: &NodeDescriptor) -> Result<ServerStatus>;

    /// Inbounds with their traffic counters and configured clients
    async fn inbounds(&self, node: &NodeDescriptor) -> Result<Vec<Inbound>>;

    /// Emails of currently connected clients
    async fn online_clients(&self, node: &NodeDescriptor) -> Result<Vec<String>>;
}
