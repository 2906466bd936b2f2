//! Round persistence
//!
//! The engine only talks to [`RoundRepository`]. Each backend is responsible
//! for the three concurrency guarantees the engine relies on: unique round
//! creation, atomic per-choice increments, and a conditional settle.

pub mod memory;
pub mod rocks;

pub use memory::MemoryRoundStore;
pub use rocks::RocksRoundStore;

use crate::{
    errors::FairroundResult,
    rounds::{Play, Round, RoundKey, Settlement},
};
use async_trait::async_trait;

/// Storage interface for rounds and plays
#[async_trait]
pub trait RoundRepository: Send + Sync {
    /// Round with its current totals, if it has been created
    async fn find_round(&self, key: &RoundKey) -> FairroundResult<Option<Round>>;

    /// Insert a new pending round. Returns `false` without writing when a
    /// round already exists for the same key.
    async fn insert_round_if_absent(&self, round: &Round) -> FairroundResult<bool>;

    /// Append the play and add its bet to the total of its choice in one
    /// atomic step. Returns `false` without writing when the round is missing
    /// or no longer pending.
    async fn increment_totals(&self, play: &Play) -> FairroundResult<bool>;

    /// Transition pending -> settled, freezing the current totals. Returns
    /// `false` without writing when the round is not pending.
    async fn try_settle(&self, key: &RoundKey, settlement: &Settlement) -> FairroundResult<bool>;

    /// Plays of one round in acceptance order
    async fn plays_for_round(&self, key: &RoundKey) -> FairroundResult<Vec<Play>>;

    /// Settled rounds of a game, newest bucket first
    async fn settled_rounds(&self, game_id: &str, limit: usize) -> FairroundResult<Vec<Round>>;

    /// Keys of rounds still pending, optionally for one game
    async fn pending_rounds(&self, game_id: Option<&str>) -> FairroundResult<Vec<RoundKey>>;
}
