//! Request Handlers
//!
//! Thin adapters from HTTP onto [`WageringEngine`]. Every fallible handler
//! takes the request id so errors can be correlated with the trace.

use super::{
    errors::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::RequestId,
    models::*,
};
use crate::{
    engine::{RoundView, WageringEngine},
    rounds::{CheckRequest, Play, PlayReceipt, PlayRequest, RecomputedCheck, VerificationReport},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: Arc<WageringEngine>,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let now_ms = state.engine.now_millis();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        server_time_ms: now_ms,
        server_time: DateTime::<Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_default(),
    })
}

/// GET /games
pub async fn list_games_handler(State(state): State<Arc<AppState>>) -> Json<GamesResponse> {
    Json(GamesResponse {
        games: state.engine.list_games(),
    })
}

/// GET /games/:game_id/round
pub async fn current_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(game_id): ApiPath<String>,
) -> Result<Json<RoundView>, ApiError> {
    state
        .engine
        .current_round(&game_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_engine(&request_id.0, e))
}

/// POST /games/:game_id/plays
pub async fn submit_play_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(game_id): ApiPath<String>,
    ApiJson(request): ApiJson<PlayRequest>,
) -> Result<(StatusCode, Json<PlayReceipt>), ApiError> {
    let receipt = state
        .engine
        .submit_play(&game_id, &request)
        .await
        .map_err(|e| ApiError::from_engine(&request_id.0, e))?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /games/:game_id/rounds/:bucket_start/plays
pub async fn round_plays_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath((game_id, bucket_start)): ApiPath<(String, u64)>,
) -> Result<Json<Vec<Play>>, ApiError> {
    state
        .engine
        .plays(&game_id, bucket_start)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_engine(&request_id.0, e))
}

/// GET /games/:game_id/history?limit=n
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath(game_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let rounds = state
        .engine
        .history(&game_id, query.limit)
        .await
        .map_err(|e| ApiError::from_engine(&request_id.0, e))?;
    Ok(Json(HistoryResponse { game_id, rounds }))
}

/// GET /games/:game_id/verify/:bucket_start
pub async fn verify_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiPath((game_id, bucket_start)): ApiPath<(String, u64)>,
) -> Result<Json<VerificationReport>, ApiError> {
    state
        .engine
        .verify(&game_id, bucket_start)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_engine(&request_id.0, e))
}

/// POST /verify
pub async fn check_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CheckRequest>,
) -> Result<Json<RecomputedCheck>, ApiError> {
    state
        .engine
        .check(&request)
        .map(Json)
        .map_err(|e| ApiError::from_engine(&request_id.0, e))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.engine.metrics().to_prometheus_format(),
    )
}
