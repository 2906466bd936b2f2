//! Route Definitions

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/games", get(list_games_handler))
        .route("/games/:game_id/round", get(current_round_handler))
        .route("/games/:game_id/plays", post(submit_play_handler))
        .route("/games/:game_id/rounds/:bucket_start/plays", get(round_plays_handler))
        .route("/games/:game_id/history", get(history_handler))
        .route("/games/:game_id/verify/:bucket_start", get(verify_round_handler))
        .route("/verify", post(check_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
