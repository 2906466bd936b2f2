//! API Data Models
//!
//! Request and response bodies. Round, play and verification payloads are the
//! engine's own serializable types.

use crate::{
    engine::{GameSummary, DEFAULT_HISTORY_LIMIT},
    rounds::Round,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub server_time_ms: u64,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesResponse {
    pub games: Vec<GameSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub game_id: String,
    pub rounds: Vec<Round>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
