// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Change events broadcast when a node's snapshot content changes

use serde_json::{Map, Value, json};

use crate::snapshot::Snapshot;

/// Field-level diff over the fields a dashboard reacts to
fn changes(old: &Snapshot, new: &Snapshot) -> Map<String, Value> {
    let fields = [
        ("available", json!(old.available), json!(new.available)),
        ("xray_running", json!(old.xray_running), json!(new.xray_running)),
        ("cpu", json!(old.cpu), json!(new.cpu)),
        ("online_clients", json!(old.online_clients), json!(new.online_clients)),
        ("traffic_total", json!(old.traffic_total), json!(new.traffic_total)),
    ];

    fields
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, old, new)| (field.to_string(), json!({"old": old, "new": new})))
        .collect()
}

/// `{node, snapshot, changes?}`; `changes` only when a previous entry exists
pub(super) fn build_delta(node: &str, snapshot: &Snapshot, previous: Option<&Snapshot>) -> Value {
    let mut delta = Map::new();
    delta.insert("node".to_string(), json!(node));
    delta.insert("snapshot".to_string(), json!(snapshot));
    if let Some(previous) = previous {
        delta.insert(
            "changes".to_string(),
            Value::Object(changes(previous, snapshot)),
        );
    }
    Value::Object(delta)
}
