// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Type definitions for panel API payloads

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Envelope every panel API endpoint answers with
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    pub obj: Option<T>,
}

/// Login answer; panels that reply with HTML are treated as success on HTTP 200
#[derive(Debug, Deserialize)]
pub(super) struct LoginResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawUsage {
    pub current: u64,
    pub total: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawXray {
    pub state: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawNet {
    pub sent: u64,
    pub recv: u64,
}

/// `obj` of `/panel/api/server/status`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawStatus {
    pub cpu: f64,
    pub mem: RawUsage,
    pub uptime: u64,
    pub xray: RawXray,
    #[serde(rename = "netTraffic")]
    pub net_traffic: RawNet,
}

/// Server health as reported by the panel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerStatus {
    pub cpu: f64,
    pub mem_current: u64,
    pub mem_total: u64,
    pub uptime: u64,
    pub xray_state: String,
    pub xray_version: String,
    pub net_up: u64,
    pub net_down: u64,
}

impl ServerStatus {
    #[must_use]
    pub fn xray_running(&self) -> bool {
        self.xray_state == "running"
    }
}

impl From<RawStatus> for ServerStatus {
    fn from(raw: RawStatus) -> Self {
        ServerStatus {
            cpu: raw.cpu,
            mem_current: raw.mem.current,
            mem_total: raw.mem.total,
            uptime: raw.uptime,
            xray_state: raw.xray.state,
            xray_version: raw.xray.version,
            net_up: raw.net_traffic.sent,
            net_down: raw.net_traffic.recv,
        }
    }
}

/// Per-client traffic counters attached to an inbound
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStat {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
    #[serde(default = "default_true")]
    pub enable: bool,
}

/// Client entry inside an inbound's `settings.clients`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundClient {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default, rename = "expiryTime")]
    pub expiry_time: i64,
    #[serde(default, rename = "totalGB")]
    pub total_gb: i64,
    #[serde(default)]
    pub flow: String,
}

#[derive(Debug, Default, Deserialize)]
struct InboundSettings {
    #[serde(default)]
    clients: Vec<InboundClient>,
}

/// One inbound from `/panel/api/inbounds/list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Panels send this either as an embedded JSON string or as an object
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub client_stats: Option<Vec<ClientStat>>,
}

impl Inbound {
    /// Inbound traffic total (up + down)
    #[must_use]
    pub fn total(&self) -> u64 {
        self.up.saturating_add(self.down)
    }

    /// Remark, or the id when the remark is empty
    #[must_use]
    pub fn label(&self) -> String {
        if self.remark.is_empty() {
            self.id.to_string()
        } else {
            self.remark.clone()
        }
    }

    /// Clients configured on this inbound.
    ///
    /// Malformed settings yield an empty list.
    #[must_use]
    pub fn clients(&self) -> Vec<InboundClient> {
        let parsed = match &self.settings {
            serde_json::Value::String(raw) => serde_json::from_str::<InboundSettings>(raw),
            serde_json::Value::Object(_) => {
                serde_json::from_value::<InboundSettings>(self.settings.clone())
            }
            _ => return Vec::new(),
        };
        match parsed {
            Ok(settings) => settings.clients,
            Err(e) => {
                tracing::warn!("Invalid settings for inbound {}: {}", self.id, e);
                Vec::new()
            }
        }
    }
}
