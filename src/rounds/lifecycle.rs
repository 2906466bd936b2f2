use super::{
    settlement::SettlementEngine,
    types::{Round, RoundKey},
};
use crate::{
    clock::{Bucket, BucketClock},
    errors::{FairroundResult, RoundError, StorageError},
    fairness::SeedCommitment,
    games::Game,
    metrics::EngineMetrics,
    storage::RoundRepository,
};
use std::sync::Arc;

/// Creates rounds lazily and routes expired ones to settlement
pub struct RoundLifecycleManager {
    repository: Arc<dyn RoundRepository>,
    commitment: Arc<SeedCommitment>,
    clock: BucketClock,
    settlement: Arc<SettlementEngine>,
    metrics: Arc<EngineMetrics>,
}

impl RoundLifecycleManager {
    pub fn new(
        repository: Arc<dyn RoundRepository>,
        commitment: Arc<SeedCommitment>,
        clock: BucketClock,
        settlement: Arc<SettlementEngine>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            repository,
            commitment,
            clock,
            settlement,
            metrics,
        }
    }

    pub fn clock(&self) -> &BucketClock {
        &self.clock
    }

    /// Fetch the round for a bucket, creating it with its commitment on a miss.
    ///
    /// Concurrent creators all get the single persisted round; a lost insert
    /// race re-reads instead of failing.
    pub async fn get_or_create_round(&self, game: &Game, bucket_start: u64) -> FairroundResult<Round> {
        ensure_aligned(game, bucket_start)?;
        let key = RoundKey::new(game.id.as_str(), bucket_start);
        if let Some(round) = self.repository.find_round(&key).await? {
            return Ok(round);
        }

        let seed_hash = self.commitment.commit(&game.id, bucket_start).to_hex();
        let round = Round::pending(game, bucket_start, seed_hash, self.clock.now_millis());

        if self.repository.insert_round_if_absent(&round).await? {
            self.metrics.record_round_created();
            tracing::info!(
                game_id = %game.id,
                bucket_start,
                seed_hash = %round.seed_hash,
                "Round opened"
            );
            return Ok(round);
        }

        self.metrics.record_creation_race();
        tracing::debug!(game_id = %game.id, bucket_start, "Lost round creation race, re-fetching");
        self.repository.find_round(&key).await?.ok_or_else(|| {
            StorageError::ReadFailed(format!(
                "Round {} of game {} vanished after insert race",
                bucket_start, game.id
            ))
            .into()
        })
    }

    /// Round of the bucket containing "now".
    ///
    /// Expired pending rounds of the game are settled first, so the first
    /// access after a bucket ends is what reveals it.
    pub async fn current_round(&self, game: &Game) -> FairroundResult<(Round, Bucket)> {
        self.settlement.settle_expired(game).await?;
        let bucket = self.clock.current_bucket(game);
        let round = self.get_or_create_round(game, bucket.start).await?;
        Ok((round, bucket))
    }

    /// Existing round of a specific bucket, settled on the way if its window
    /// has passed. Never creates a round.
    pub async fn round_at(&self, game: &Game, bucket_start: u64) -> FairroundResult<Round> {
        ensure_aligned(game, bucket_start)?;
        let key = RoundKey::new(game.id.as_str(), bucket_start);
        let round = self
            .repository
            .find_round(&key)
            .await?
            .ok_or_else(|| RoundError::NotFound {
                game_id: game.id.clone(),
                bucket_start,
            })?;

        if !round.is_settled() && self.clock.has_closed(game, bucket_start) {
            return self.settlement.settle(game, bucket_start).await;
        }
        Ok(round)
    }
}

pub(crate) fn ensure_aligned(game: &Game, bucket_start: u64) -> Result<(), RoundError> {
    if bucket_start % game.round_duration_secs != 0 {
        return Err(RoundError::Misaligned {
            bucket_start,
            duration_secs: game.round_duration_secs,
        });
    }
    Ok(())
}
