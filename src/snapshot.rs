// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Point-in-time node snapshots and their content fingerprints

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch as a float, the timestamp format used on the wire
#[must_use]
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// One poll outcome for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub node_id: Option<i64>,
    pub available: bool,
    pub xray_running: bool,
    pub cpu: f64,
    pub online_clients: u64,
    pub traffic_total: u64,
    pub poll_ms: f64,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Observable content of a snapshot, in a fixed field order.
///
/// `timestamp` and `poll_ms` differ on every poll and are left out.
#[derive(Serialize)]
struct FingerprintView<'a> {
    name: &'a str,
    node_id: Option<i64>,
    available: bool,
    xray_running: bool,
    cpu: f64,
    online_clients: u64,
    traffic_total: u64,
    error: Option<&'a str>,
}

impl Snapshot {
    /// Snapshot for a node that could not be polled
    #[must_use]
    pub fn unavailable(name: &str, node_id: Option<i64>, error: impl Into<String>) -> Self {
        Snapshot {
            name: name.to_string(),
            node_id,
            available: false,
            xray_running: false,
            cpu: 0.0,
            online_clients: 0,
            traffic_total: 0,
            poll_ms: 0.0,
            timestamp: unix_now(),
            error: Some(error.into()),
        }
    }

    /// Deterministic digest of the snapshot content.
    ///
    /// Equal content always yields the same hex string.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let view = FingerprintView {
            name: &self.name,
            node_id: self.node_id,
            available: self.available,
            xray_running: self.xray_running,
            cpu: self.cpu,
            online_clients: self.online_clients,
            traffic_total: self.traffic_total,
            error: self.error.as_deref(),
        };
        // Serializing a struct of plain fields cannot fail
        let canonical = serde_json::to_vec(&view).unwrap_or_default();
        hex::encode(md5::compute(&canonical).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot(cpu: f64, online: u64) -> Snapshot {
        Snapshot {
            name: "node-a".to_string(),
            node_id: Some(1),
            available: true,
            xray_running: true,
            cpu,
            online_clients: online,
            traffic_total: 1024,
            poll_ms: 12.5,
            timestamp: 1_700_000_000.0,
            error: None,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_for_equal_content() {
        assert_eq!(
            make_snapshot(10.0, 3).fingerprint(),
            make_snapshot(10.0, 3).fingerprint()
        );
    }

    #[test]
    fn test_fingerprint_ignores_timestamp_and_poll_duration() {
        let a = make_snapshot(10.0, 3);
        let mut b = a.clone();
        b.timestamp += 60.0;
        b.poll_ms = 999.0;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = make_snapshot(10.0, 3);
        assert_ne!(a.fingerprint(), make_snapshot(10.5, 3).fingerprint());
        assert_ne!(a.fingerprint(), make_snapshot(10.0, 4).fingerprint());
    }

    #[test]
    fn test_fingerprint_is_md5_hex() {
        let fp = make_snapshot(1.0, 1).fingerprint();
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unavailable_snapshot() {
        let snapshot = Snapshot::unavailable("edge", Some(4), "connection refused");
        assert!(!snapshot.available);
        assert_eq!(snapshot.error.as_deref(), Some("connection refused"));
        assert_eq!(snapshot.online_clients, 0);
        assert!(snapshot.timestamp > 0.0);
    }

    #[test]
    fn test_error_field_is_omitted_when_absent() {
        let json = serde_json::to_value(make_snapshot(1.0, 1)).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["name"], "node-a");
    }
}
