// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Handlers over the cached fleet views

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::AppState;
use crate::api::error::error_response;
use crate::cache::{DashboardSummary, GroupBy};
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct TrafficQuery {
    pub group_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientsQuery {
    pub email: Option<String>,
}

/// GET /api/v1/traffic/stats?group_by=client|inbound|node
pub async fn traffic_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrafficQuery>,
) -> Response {
    let group_by = match query.group_by.as_deref().unwrap_or("client").parse::<GroupBy>() {
        Ok(group_by) => group_by,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.views.traffic_stats(group_by).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/clients/online
pub async fn online_clients(State(state): State<Arc<AppState>>) -> Result<Response> {
    let online = state.views.online_clients().await?;
    let count = online.len();
    Ok(Json(json!({ "online_clients": online, "count": count })).into_response())
}

/// GET /api/v1/clients?email=
///
/// The optional `email` filter is a case-insensitive substring match applied
/// to the cached roster.
pub async fn clients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientsQuery>,
) -> Result<Response> {
    let mut clients = state.views.clients().await?;

    if let Some(filter) = query.email.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        let filter = filter.to_lowercase();
        clients.retain(|c| c.email.to_lowercase().contains(&filter));
    }

    let count = clients.len();
    Ok(Json(json!({ "clients": clients, "count": count })).into_response())
}

/// GET /api/v1/dashboard/summary
pub async fn dashboard_summary(State(state): State<Arc<AppState>>) -> Result<Json<DashboardSummary>> {
    Ok(Json(state.views.dashboard_summary().await?))
}
