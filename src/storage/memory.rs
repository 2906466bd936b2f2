//! In-process round store
//!
//! DashMap shard locks provide the atomicity: every conditional write happens
//! while the entry for its round is held.

use super::RoundRepository;
use crate::{
    errors::FairroundResult,
    rounds::{Play, Round, RoundKey, RoundStatus, Settlement},
};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

#[derive(Default)]
pub struct MemoryRoundStore {
    rounds: DashMap<RoundKey, Round>,
    plays: DashMap<RoundKey, Vec<Play>>,
    pending: DashMap<RoundKey, ()>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds ever created
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }
}

#[async_trait]
impl RoundRepository for MemoryRoundStore {
    async fn find_round(&self, key: &RoundKey) -> FairroundResult<Option<Round>> {
        Ok(self.rounds.get(key).map(|round| round.clone()))
    }

    async fn insert_round_if_absent(&self, round: &Round) -> FairroundResult<bool> {
        let key = round.key();
        match self.rounds.entry(key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(round.clone());
                self.pending.insert(key, ());
                Ok(true)
            }
        }
    }

    async fn increment_totals(&self, play: &Play) -> FairroundResult<bool> {
        let key = play.round_key();
        let Some(mut round) = self.rounds.get_mut(&key) else {
            return Ok(false);
        };
        if round.status != RoundStatus::Pending {
            return Ok(false);
        }

        let total = round.totals.entry(play.choice.clone()).or_insert(0);
        *total = total.saturating_add(play.bet_amount);
        self.plays.entry(key).or_default().push(play.clone());
        Ok(true)
    }

    async fn try_settle(&self, key: &RoundKey, settlement: &Settlement) -> FairroundResult<bool> {
        let Some(mut round) = self.rounds.get_mut(key) else {
            return Ok(false);
        };
        if round.status != RoundStatus::Pending {
            return Ok(false);
        }

        round.settle_with(settlement);
        self.pending.remove(key);
        Ok(true)
    }

    async fn plays_for_round(&self, key: &RoundKey) -> FairroundResult<Vec<Play>> {
        Ok(self
            .plays
            .get(key)
            .map(|plays| plays.clone())
            .unwrap_or_default())
    }

    async fn settled_rounds(&self, game_id: &str, limit: usize) -> FairroundResult<Vec<Round>> {
        let mut rounds: Vec<Round> = self
            .rounds
            .iter()
            .filter(|entry| entry.game_id == game_id && entry.is_settled())
            .map(|entry| entry.value().clone())
            .collect();
        rounds.sort_by(|a, b| b.bucket_start.cmp(&a.bucket_start));
        rounds.truncate(limit);
        Ok(rounds)
    }

    async fn pending_rounds(&self, game_id: Option<&str>) -> FairroundResult<Vec<RoundKey>> {
        let mut keys: Vec<RoundKey> = self
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| game_id.map_or(true, |id| key.game_id == id))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
