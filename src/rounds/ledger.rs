use super::{
    lifecycle::{ensure_aligned, RoundLifecycleManager},
    types::{Play, RoundKey},
};
use crate::{
    errors::{FairroundError, FairroundResult, PlayError, RoundError},
    games::Game,
    metrics::EngineMetrics,
    storage::RoundRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Bet as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayRequest {
    pub user_id: String,
    pub bet_amount: u64,
    pub choice: String,
    /// Round the client is betting on; the current bucket when absent
    #[serde(default)]
    pub bucket_start: Option<u64>,
}

/// Acknowledgement of an accepted play
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayReceipt {
    pub play_id: Uuid,
    pub game_id: String,
    pub bucket_start: u64,
    pub choice: String,
    pub timestamp_ms: u64,
}

/// Accepts bets into open rounds
pub struct PlayLedger {
    repository: Arc<dyn RoundRepository>,
    lifecycle: Arc<RoundLifecycleManager>,
    metrics: Arc<EngineMetrics>,
}

impl PlayLedger {
    pub fn new(
        repository: Arc<dyn RoundRepository>,
        lifecycle: Arc<RoundLifecycleManager>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            repository,
            lifecycle,
            metrics,
        }
    }

    /// Validate and record a play. Rejections leave no trace in storage.
    pub async fn submit_play(&self, game: &Game, request: &PlayRequest) -> FairroundResult<PlayReceipt> {
        match self.accept(game, request).await {
            Ok(receipt) => {
                self.metrics.record_play(request.bet_amount);
                tracing::debug!(
                    game_id = %game.id,
                    bucket_start = receipt.bucket_start,
                    play_id = %receipt.play_id,
                    choice = %receipt.choice,
                    bet_amount = request.bet_amount,
                    "Play accepted"
                );
                Ok(receipt)
            }
            Err(e) => {
                if e.is_client_error() {
                    self.metrics.record_rejection();
                    tracing::debug!(game_id = %game.id, "Play rejected: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn accept(&self, game: &Game, request: &PlayRequest) -> FairroundResult<PlayReceipt> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(PlayError::MissingUser.into());
        }
        if !game.bet_in_bounds(request.bet_amount) {
            return Err(PlayError::BetOutOfBounds {
                amount: request.bet_amount,
                min: game.min_bet,
                max: game.max_bet,
            }
            .into());
        }
        let choice = game
            .knobs
            .canonical_choice(&request.choice)
            .ok_or_else(|| PlayError::InvalidChoice {
                game_id: game.id.clone(),
                choice: request.choice.clone(),
            })?;

        let clock = self.lifecycle.clock();
        let current = clock.current_bucket(game);
        let bucket_start = match request.bucket_start {
            Some(target) => {
                ensure_aligned(game, target)?;
                if target > current.start {
                    return Err(PlayError::BucketNotOpen {
                        game_id: game.id.clone(),
                        bucket_start: target,
                    }
                    .into());
                }
                target
            }
            None => current.start,
        };

        let closes_at = bucket_start + game.round_duration_secs;
        let closed = || -> FairroundError {
            PlayError::BucketClosed {
                game_id: game.id.clone(),
                bucket_start,
                closes_at,
            }
            .into()
        };
        // Decided by the clock, whatever the stored status says.
        if clock.has_closed(game, bucket_start) {
            return Err(closed());
        }

        self.lifecycle.get_or_create_round(game, bucket_start).await?;

        let timestamp_ms = clock.now_millis();
        if timestamp_ms >= closes_at * 1000 {
            return Err(closed());
        }

        let play = Play {
            play_id: Uuid::new_v4(),
            game_id: game.id.clone(),
            bucket_start,
            user_id: user_id.to_string(),
            bet_amount: request.bet_amount,
            choice,
            timestamp_ms,
        };
        // A settle that slipped in after the clock check makes this a no-op.
        if !self.repository.increment_totals(&play).await? {
            return Err(closed());
        }

        Ok(PlayReceipt {
            play_id: play.play_id,
            game_id: play.game_id,
            bucket_start,
            choice: play.choice,
            timestamp_ms,
        })
    }

    /// Accepted plays of an existing round, in acceptance order
    pub async fn plays_for_round(&self, game: &Game, bucket_start: u64) -> FairroundResult<Vec<Play>> {
        ensure_aligned(game, bucket_start)?;
        let key = RoundKey::new(game.id.as_str(), bucket_start);
        if self.repository.find_round(&key).await?.is_none() {
            return Err(RoundError::NotFound {
                game_id: game.id.clone(),
                bucket_start,
            }
            .into());
        }
        self.repository.plays_for_round(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{BucketClock, ManualClock},
        fairness::SeedCommitment,
        games::GameKnobs,
        rounds::settlement::{NoopPayout, SettlementEngine},
        storage::MemoryRoundStore,
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

    fn request(user: &str, amount: u64, choice: &str) -> PlayRequest {
        PlayRequest {
            user_id: user.to_string(),
            bet_amount: amount,
            choice: choice.to_string(),
            bucket_start: None,
        }
    }

    fn ledger(clock: Arc<ManualClock>) -> (PlayLedger, Arc<MemoryRoundStore>, Arc<EngineMetrics>) {
        let store = Arc::new(MemoryRoundStore::new());
        let commitment = Arc::new(SeedCommitment::new(b"ledger-test-secret".to_vec()));
        let metrics = Arc::new(EngineMetrics::new());
        let buckets = BucketClock::new(clock);
        let settlement = Arc::new(SettlementEngine::new(
            store.clone(),
            commitment.clone(),
            buckets.clone(),
            Arc::new(NoopPayout),
            metrics.clone(),
        ));
        let lifecycle = Arc::new(RoundLifecycleManager::new(
            store.clone(),
            commitment,
            buckets,
            settlement,
            metrics.clone(),
        ));
        (
            PlayLedger::new(store.clone(), lifecycle, metrics.clone()),
            store,
            metrics,
        )
    }

    #[tokio::test]
    async fn test_accepts_and_tallies() {
        let (ledger, store, metrics) = ledger(Arc::new(ManualClock::at_secs(605)));

        let receipt = ledger.submit_play(&dice(), &request("alice", 100, "HIGH")).await.unwrap();
        assert_eq!(receipt.bucket_start, 600);
        assert_eq!(receipt.choice, "high");
        assert_eq!(receipt.timestamp_ms, 605_000);

        ledger.submit_play(&dice(), &request("bob", 40, "high")).await.unwrap();
        let round = store.find_round(&RoundKey::new("dice", 600)).await.unwrap().unwrap();
        assert_eq!(round.totals.get("high"), Some(&140));
        assert_eq!(metrics.snapshot().wagered_total, 140);
        assert_eq!(ledger.plays_for_round(&dice(), 600).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_rejects_without_state() {
        let (ledger, store, metrics) = ledger(Arc::new(ManualClock::at_secs(605)));

        for (req, expected) in [
            (request("", 100, "high"), PlayError::MissingUser),
            (
                request("alice", 5, "high"),
                PlayError::BetOutOfBounds { amount: 5, min: 10, max: 1000 },
            ),
            (
                request("alice", 100, "middle"),
                PlayError::InvalidChoice {
                    game_id: "dice".to_string(),
                    choice: "middle".to_string(),
                },
            ),
        ] {
            match ledger.submit_play(&dice(), &req).await {
                Err(FairroundError::Play(err)) => assert_eq!(err, expected),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(store.round_count(), 0);
        assert_eq!(metrics.snapshot().plays_rejected, 3);
    }

    #[tokio::test]
    async fn test_closed_bucket_rejected_even_when_pending() {
        let clock = Arc::new(ManualClock::at_secs(605));
        let (ledger, store, _) = ledger(clock.clone());
        ledger.submit_play(&dice(), &request("alice", 100, "high")).await.unwrap();

        clock.set_secs(661);
        let mut late = request("carol", 20, "low");
        late.bucket_start = Some(600);
        assert!(matches!(
            ledger.submit_play(&dice(), &late).await,
            Err(FairroundError::Play(PlayError::BucketClosed { closes_at: 660, .. }))
        ));

        let round = store.find_round(&RoundKey::new("dice", 600)).await.unwrap().unwrap();
        assert!(!round.is_settled());
        assert_eq!(round.total_wagered(), 100);
    }

    #[tokio::test]
    async fn test_window_boundary_is_exclusive() {
        let clock = Arc::new(ManualClock::at_secs(605));
        let (ledger, store, _) = ledger(clock.clone());
        let mut targeted = request("alice", 100, "high");
        targeted.bucket_start = Some(600);

        clock.set_millis(659_999);
        let receipt = ledger.submit_play(&dice(), &targeted).await.unwrap();
        assert_eq!(receipt.bucket_start, 600);
        assert_eq!(receipt.timestamp_ms, 659_999);

        clock.set_millis(660_000);
        let mut at_end = request("bob", 50, "low");
        at_end.bucket_start = Some(600);
        assert!(matches!(
            ledger.submit_play(&dice(), &at_end).await,
            Err(FairroundError::Play(PlayError::BucketClosed { closes_at: 660, .. }))
        ));

        let round = store.find_round(&RoundKey::new("dice", 600)).await.unwrap().unwrap();
        assert_eq!(round.totals.get("high"), Some(&100));
        assert_eq!(round.totals.get("low"), None);
        assert_eq!(ledger.plays_for_round(&dice(), 600).await.unwrap().len(), 1);

        // Untargeted, the same instant belongs to the next bucket.
        let next = ledger.submit_play(&dice(), &request("bob", 50, "low")).await.unwrap();
        assert_eq!(next.bucket_start, 660);
    }

    #[tokio::test]
    async fn test_future_bucket_rejected() {
        let (ledger, _, _) = ledger(Arc::new(ManualClock::at_secs(605)));
        let mut early = request("alice", 100, "high");
        early.bucket_start = Some(660);
        assert!(matches!(
            ledger.submit_play(&dice(), &early).await,
            Err(FairroundError::Play(PlayError::BucketNotOpen { .. }))
        ));
    }
}
