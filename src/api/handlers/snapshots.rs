// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{Json, extract::State};
use std::sync::Arc;

use crate::api::AppState;
use crate::collector::LatestSnapshot;

/// GET /api/v1/snapshots/latest
pub async fn latest_snapshots(State(state): State<Arc<AppState>>) -> Json<LatestSnapshot> {
    Json(state.collector.latest_snapshot().await)
}
