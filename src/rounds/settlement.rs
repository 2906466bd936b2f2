//! Reveal and settlement
//!
//! The seed is re-derived from the secret, checked against the stored
//! commitment, and only then run through the random stream. The pending ->
//! settled write is conditional, and only the caller that performs it hands
//! the round to the payout rule.

use super::types::{Play, Round, RoundKey, Settlement};
use crate::{
    clock::BucketClock,
    errors::{FairroundResult, RoundError},
    fairness::{RandomStream, Seed, SeedCommitment},
    games::{Game, GameKnobs, Outcome},
    metrics::EngineMetrics,
    storage::RoundRepository,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Maps a settled round to credits in the external ledger
#[async_trait]
pub trait PayoutRule: Send + Sync {
    /// Called at most once per round, after the settled state is durable.
    async fn apply(&self, game: &Game, round: &Round, plays: &[Play]) -> FairroundResult<()>;
}

/// Payout rule that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPayout;

#[async_trait]
impl PayoutRule for NoopPayout {
    async fn apply(&self, game: &Game, round: &Round, plays: &[Play]) -> FairroundResult<()> {
        tracing::debug!(
            game_id = %game.id,
            bucket_start = round.bucket_start,
            plays = plays.len(),
            "No payout rule configured"
        );
        Ok(())
    }
}

/// Outcome of a seed under a game's knobs, from a fresh stream
pub fn compute_outcome(knobs: &GameKnobs, seed: Seed) -> Outcome {
    let mut stream = RandomStream::new(seed);
    knobs.draw_outcome(&mut stream)
}

pub struct SettlementEngine {
    repository: Arc<dyn RoundRepository>,
    commitment: Arc<SeedCommitment>,
    clock: BucketClock,
    payout: Arc<dyn PayoutRule>,
    metrics: Arc<EngineMetrics>,
}

impl SettlementEngine {
    pub fn new(
        repository: Arc<dyn RoundRepository>,
        commitment: Arc<SeedCommitment>,
        clock: BucketClock,
        payout: Arc<dyn PayoutRule>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            repository,
            commitment,
            clock,
            payout,
            metrics,
        }
    }

    /// Settle one round whose bucket has closed.
    ///
    /// Returns the settled round. Settling an already-settled round returns
    /// it unchanged and does not touch the payout rule.
    pub async fn settle(&self, game: &Game, bucket_start: u64) -> FairroundResult<Round> {
        let key = RoundKey::new(game.id.as_str(), bucket_start);
        let round = self.load(&key).await?;

        if round.is_settled() {
            self.metrics.record_settlement_noop();
            return Ok(round);
        }
        if !self.clock.has_closed(game, bucket_start) {
            return Err(RoundError::StillOpen {
                game_id: game.id.clone(),
                bucket_start,
                closes_at: round.ends_at(),
            }
            .into());
        }

        let seed = self.commitment.derive_seed(&game.id, bucket_start);
        if seed.commitment().to_hex() != round.seed_hash {
            tracing::error!(
                game_id = %game.id,
                bucket_start,
                "Derived seed does not match the published commitment, refusing to settle"
            );
            return Err(RoundError::CommitmentMismatch {
                game_id: game.id.clone(),
                bucket_start,
            }
            .into());
        }

        let settlement = Settlement {
            seed_revealed: seed.to_hex(),
            outcome: compute_outcome(&game.knobs, seed),
            settled_at_ms: self.clock.now_millis(),
        };

        if !self.repository.try_settle(&key, &settlement).await? {
            tracing::debug!(game_id = %game.id, bucket_start, "Round settled by another caller");
            self.metrics.record_settlement_noop();
            return self.load(&key).await;
        }

        self.metrics.record_settlement();
        let settled = self.load(&key).await?;
        tracing::info!(
            game_id = %game.id,
            bucket_start,
            winning = ?settlement.outcome.winning,
            total_wagered = settled.total_wagered(),
            "Round settled"
        );

        let plays = self.repository.plays_for_round(&key).await?;
        if let Err(e) = self.payout.apply(game, &settled, &plays).await {
            tracing::error!(game_id = %game.id, bucket_start, "Payout rule failed: {}", e);
        }
        Ok(settled)
    }

    /// Settle every pending round of `game` whose bucket has closed.
    ///
    /// A round that fails to settle is logged and skipped; it only affects
    /// itself. Returns the rounds that did settle.
    pub async fn settle_expired(&self, game: &Game) -> FairroundResult<Vec<Round>> {
        let mut settled = Vec::new();
        for key in self.repository.pending_rounds(Some(game.id.as_str())).await? {
            if !self.clock.has_closed(game, key.bucket_start) {
                continue;
            }
            match self.settle(game, key.bucket_start).await {
                Ok(round) => settled.push(round),
                Err(e) => {
                    tracing::warn!(
                        game_id = %game.id,
                        bucket_start = key.bucket_start,
                        "Skipping round that failed to settle: {}",
                        e
                    );
                }
            }
        }
        Ok(settled)
    }

    async fn load(&self, key: &RoundKey) -> FairroundResult<Round> {
        self.repository
            .find_round(key)
            .await?
            .ok_or_else(|| {
                RoundError::NotFound {
                    game_id: key.game_id.clone(),
                    bucket_start: key.bucket_start,
                }
                .into()
            })
    }
}
