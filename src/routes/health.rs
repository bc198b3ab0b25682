//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::state::AppState;

static STARTED: Lazy<Instant> = Lazy::new(Instant::now);

/// Record the process start time. Called once from startup so uptime is
/// measured from boot rather than from the first health probe.
pub fn mark_started() {
    Lazy::force(&STARTED);
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub slots_available: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: STARTED.elapsed().as_secs(),
        slots_available: state.slots_available(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
