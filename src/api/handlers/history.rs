// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::api::AppState;
use crate::api::error::error_response;

/// GET /api/v1/nodes/{name}/history
///
/// A node the collector knows but that has no retained samples yet returns an
/// empty list; an unknown node is a 404.
pub async fn node_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let points = match state.history.history(&name).await {
        Some(points) => points,
        None if state.collector.table().get(&name).await.is_some() => Vec::new(),
        None => return error_response(StatusCode::NOT_FOUND, "Node not found"),
    };

    let count = points.len();
    Json(json!({ "node": name, "points": points, "count": count })).into_response()
}
