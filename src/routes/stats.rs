// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public usage stats.

use crate::error::Result;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stats", get(get_stats))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_users: i64,
    pub calculations_today: u32,
    pub updated_at: Option<String>,
}

/// Aggregate totals. Zeros before anything has been recorded.
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>> {
    let stats = state.db.get_app_stats().await?.unwrap_or_default();
    let policy = state.quota_policy;

    Ok(Json(StatsResponse {
        total_users: stats.total_users,
        calculations_today: stats.calculations_on(Utc::now(), |at| policy.day_of(at)),
        updated_at: Some(stats.updated_at).filter(|s| !s.is_empty()),
    }))
}
