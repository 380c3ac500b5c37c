//! Dashboard API route handlers.
//!
//! Reports on the engine's own health (cache occupancy, shutdown state)
//! — never on coin data, which stays behind `CoinService`'s plain async
//! methods rather than an HTTP surface (expansion §4.1, spec.md Non-goals).

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::CoinService;

pub type AppState = Arc<CoinService>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub coin_cache_entries: usize,
    pub list_cache_entries: usize,
    pub shutting_down: bool,
}

/// GET /api/status
pub async fn get_status(State(service): State<AppState>) -> Json<StatusResponse> {
    let health = service.health().await;
    Json(StatusResponse {
        coin_cache_entries: health.coin_cache_entries,
        list_cache_entries: health.list_cache_entries,
        shutting_down: health.shutting_down,
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
