//! Wiring of the engine components behind one façade
//!
//! The HTTP layer and the binary only talk to [`WageringEngine`], which
//! resolves game ids through the catalog and forwards to the round services.

use crate::{
    clock::{BucketClock, Clock},
    config::{FairroundConfig, StorageBackend},
    errors::FairroundResult,
    fairness::SeedCommitment,
    games::{GameCatalog, GameKnobs, Outcome},
    metrics::EngineMetrics,
    rounds::{
        CheckRequest, Play, PlayLedger, PlayReceipt, PlayRequest, PayoutRule, RecomputedCheck,
        Round, RoundLifecycleManager, RoundStatus, SettlementEngine, SettlementSweeper, Totals,
        VerificationReport, VerificationService,
    },
    storage::{MemoryRoundStore, RocksRoundStore, RoundRepository},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// History page size when the caller gives none
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Largest history page served
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Listing entry for one game, with its live bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSummary {
    pub id: String,
    pub name: String,
    pub round_duration_secs: u64,
    pub bucket_start: u64,
    pub seconds_remaining: u64,
    pub min_bet: u64,
    pub max_bet: u64,
    pub knobs: GameKnobs,
    /// Values a play may name as its choice
    pub choices: Vec<String>,
}

/// Public view of the current round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundView {
    pub game_id: String,
    pub bucket_start: u64,
    pub status: RoundStatus,
    pub seed_hash: String,
    pub seconds_remaining: u64,
    pub knobs: GameKnobs,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_revealed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

pub struct WageringEngine {
    catalog: Arc<GameCatalog>,
    clock: BucketClock,
    repository: Arc<dyn RoundRepository>,
    lifecycle: Arc<RoundLifecycleManager>,
    ledger: PlayLedger,
    settlement: Arc<SettlementEngine>,
    verification: VerificationService,
    metrics: Arc<EngineMetrics>,
}

impl WageringEngine {
    pub fn new(
        catalog: GameCatalog,
        repository: Arc<dyn RoundRepository>,
        clock: Arc<dyn Clock>,
        commitment: SeedCommitment,
        payout: Arc<dyn PayoutRule>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let clock = BucketClock::new(clock);
        let commitment = Arc::new(commitment);
        let metrics = Arc::new(EngineMetrics::new());

        let settlement = Arc::new(SettlementEngine::new(
            repository.clone(),
            commitment.clone(),
            clock.clone(),
            payout,
            metrics.clone(),
        ));
        let lifecycle = Arc::new(RoundLifecycleManager::new(
            repository.clone(),
            commitment,
            clock.clone(),
            settlement.clone(),
            metrics.clone(),
        ));
        let ledger = PlayLedger::new(repository.clone(), lifecycle.clone(), metrics.clone());
        let verification = VerificationService::new(lifecycle.clone());

        Self {
            catalog,
            clock,
            repository,
            lifecycle,
            ledger,
            settlement,
            verification,
            metrics,
        }
    }

    /// Engine over the configured catalog, secret and storage backend
    pub fn from_config(
        config: &FairroundConfig,
        clock: Arc<dyn Clock>,
        payout: Arc<dyn PayoutRule>,
    ) -> FairroundResult<Self> {
        let catalog = config.catalog()?;
        let commitment = SeedCommitment::new(config.engine.secret_bytes()?);
        let repository: Arc<dyn RoundRepository> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryRoundStore::new()),
            StorageBackend::Rocksdb => Arc::new(RocksRoundStore::open(&config.storage.data_dir)?),
        };
        tracing::info!(
            games = catalog.len(),
            backend = ?config.storage.backend,
            "Wagering engine initialized"
        );
        Ok(Self::new(catalog, repository, clock, commitment, payout))
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Server time every bucket decision is based on
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Every offered game with its current bucket. Pure clock arithmetic,
    /// no round is created.
    pub fn list_games(&self) -> Vec<GameSummary> {
        self.catalog
            .iter()
            .map(|game| {
                let bucket = self.clock.current_bucket(game);
                GameSummary {
                    id: game.id.clone(),
                    name: game.name.clone(),
                    round_duration_secs: game.round_duration_secs,
                    bucket_start: bucket.start,
                    seconds_remaining: bucket.seconds_remaining,
                    min_bet: game.min_bet,
                    max_bet: game.max_bet,
                    knobs: game.knobs.clone(),
                    choices: game.knobs.choices(),
                }
            })
            .collect()
    }

    pub async fn current_round(&self, game_id: &str) -> FairroundResult<RoundView> {
        let game = self.catalog.require(game_id)?;
        let (round, bucket) = self.lifecycle.current_round(&game).await?;
        Ok(RoundView {
            game_id: round.game_id,
            bucket_start: round.bucket_start,
            status: round.status,
            seed_hash: round.seed_hash,
            seconds_remaining: bucket.seconds_remaining,
            knobs: game.knobs.clone(),
            totals: round.totals,
            seed_revealed: round.seed_revealed,
            outcome: round.outcome,
        })
    }

    pub async fn submit_play(&self, game_id: &str, request: &PlayRequest) -> FairroundResult<PlayReceipt> {
        let game = match self.catalog.require(game_id) {
            Ok(game) => game,
            Err(e) => {
                self.metrics.record_rejection();
                return Err(e);
            }
        };
        self.ledger.submit_play(&game, request).await
    }

    pub async fn plays(&self, game_id: &str, bucket_start: u64) -> FairroundResult<Vec<Play>> {
        let game = self.catalog.require(game_id)?;
        self.ledger.plays_for_round(&game, bucket_start).await
    }

    /// Settled rounds newest first. `limit` is clamped to
    /// [`MAX_HISTORY_LIMIT`], zero means the default page.
    pub async fn history(&self, game_id: &str, limit: usize) -> FairroundResult<Vec<Round>> {
        let game = self.catalog.require(game_id)?;
        self.settlement.settle_expired(&game).await?;
        let limit = match limit {
            0 => DEFAULT_HISTORY_LIMIT,
            n => n.min(MAX_HISTORY_LIMIT),
        };
        self.repository.settled_rounds(&game.id, limit).await
    }

    pub async fn verify(&self, game_id: &str, bucket_start: u64) -> FairroundResult<VerificationReport> {
        let game = self.catalog.require(game_id)?;
        self.verification.verify(&game, bucket_start).await
    }

    pub fn check(&self, request: &CheckRequest) -> FairroundResult<RecomputedCheck> {
        let game = self.catalog.require(&request.game_id)?;
        Ok(self.verification.check(&game, request)?)
    }

    /// Settle every expired round of every game. Returns how many settled.
    pub async fn settle_expired(&self) -> FairroundResult<usize> {
        let mut settled = 0;
        for game in self.catalog.iter() {
            settled += self.settlement.settle_expired(game).await?.len();
        }
        Ok(settled)
    }

    /// Start the background sweeper; `None` when the interval is zero
    pub fn spawn_sweeper(&self, interval_secs: u64) -> Option<Arc<SettlementSweeper>> {
        if interval_secs == 0 {
            return None;
        }
        Some(SettlementSweeper::spawn(
            self.settlement.clone(),
            self.catalog.clone(),
            Duration::from_secs(interval_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        errors::FairroundError,
        games::Game,
        rounds::NoopPayout,
    };

    fn dice() -> Game {
        Game {
            id: "dice".to_string(),
            name: "Dice".to_string(),
            round_duration_secs: 60,
            min_bet: 10,
            max_bet: 1000,
            knobs: GameKnobs::HighLow,
        }
    }

    fn engine(clock: Arc<ManualClock>) -> WageringEngine {
        engine_with_store(clock, Arc::new(MemoryRoundStore::new()))
    }

    fn engine_with_store(clock: Arc<ManualClock>, store: Arc<MemoryRoundStore>) -> WageringEngine {
        WageringEngine::new(
            GameCatalog::new(vec![dice()]).unwrap(),
            store,
            clock,
            SeedCommitment::new(b"engine-test-secret".to_vec()),
            Arc::new(NoopPayout),
        )
    }

    #[tokio::test]
    async fn test_list_games_reports_bucket() {
        let engine = engine(Arc::new(ManualClock::at_secs(1_000)));
        let games = engine.list_games();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].bucket_start, 960);
        assert_eq!(games[0].seconds_remaining, 20);
        assert_eq!(games[0].choices, vec!["low".to_string(), "high".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_game_is_rejected() {
        let engine = engine(Arc::new(ManualClock::at_secs(1_000)));
        let request = PlayRequest {
            user_id: "alice".to_string(),
            bet_amount: 100,
            choice: "high".to_string(),
            bucket_start: None,
        };
        assert!(matches!(
            engine.submit_play("poker", &request).await,
            Err(FairroundError::UnknownGame(_))
        ));
        assert_eq!(engine.metrics().snapshot().plays_rejected, 1);
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_clamped() {
        let clock = Arc::new(ManualClock::at_secs(0));
        let engine = engine(clock.clone());
        for minute in 0..4 {
            clock.set_secs(minute * 60 + 1);
            engine.current_round("dice").await.unwrap();
        }
        clock.set_secs(4 * 60 + 1);

        let history = engine.history("dice", 0).await.unwrap();
        let buckets: Vec<u64> = history.iter().map(|r| r.bucket_start).collect();
        assert_eq!(buckets, vec![180, 120, 60, 0]);
        assert_eq!(engine.history("dice", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_round_from_rotated_secret_does_not_block_game() {
        let store = Arc::new(MemoryRoundStore::new());
        let rotated = SeedCommitment::new(b"previous-engine-secret".to_vec());
        let stale = Round::pending(&dice(), 60, rotated.commit("dice", 60).to_hex(), 60_000);
        store.insert_round_if_absent(&stale).await.unwrap();

        let clock = Arc::new(ManualClock::at_secs(10_005));
        let engine = engine_with_store(clock.clone(), store.clone());

        let round = engine.current_round("dice").await.unwrap();
        assert_eq!(round.bucket_start, 9_960);
        assert_eq!(round.status, RoundStatus::Pending);
        assert!(engine.history("dice", 10).await.unwrap().is_empty());

        clock.set_secs(20_005);
        engine.current_round("dice").await.unwrap();
        let history = engine.history("dice", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bucket_start, 9_960);

        // The stale round stays pending and reports its own failure.
        assert!(matches!(
            engine.verify("dice", 60).await,
            Err(FairroundError::Round(crate::errors::RoundError::CommitmentMismatch { .. }))
        ));
        assert!(!store.find_round(&stale.key()).await.unwrap().unwrap().is_settled());
    }
}
