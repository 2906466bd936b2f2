use crate::games::{Game, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Bet amounts summed per choice
pub type Totals = BTreeMap<String, u64>;

/// Round status; `Settled` is terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Settled,
}

/// Identity of a round: one per (game, bucket)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundKey {
    pub game_id: String,
    pub bucket_start: u64,
}

impl RoundKey {
    pub fn new(game_id: impl Into<String>, bucket_start: u64) -> Self {
        Self {
            game_id: game_id.into(),
            bucket_start,
        }
    }
}

/// Persisted round record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round {
    pub game_id: String,
    pub bucket_start: u64,
    pub duration_secs: u64,
    pub status: RoundStatus,
    /// Hex commitment, fixed at creation
    pub seed_hash: String,
    /// Hex seed, present iff settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_revealed: Option<String>,
    /// Present iff settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub totals: Totals,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at_ms: Option<u64>,
}

impl Round {
    /// Fresh pending round carrying only its commitment
    pub fn pending(game: &Game, bucket_start: u64, seed_hash: String, created_at_ms: u64) -> Self {
        Self {
            game_id: game.id.clone(),
            bucket_start,
            duration_secs: game.round_duration_secs,
            status: RoundStatus::Pending,
            seed_hash,
            seed_revealed: None,
            outcome: None,
            totals: Totals::new(),
            created_at_ms,
            settled_at_ms: None,
        }
    }

    pub fn key(&self) -> RoundKey {
        RoundKey::new(self.game_id.clone(), self.bucket_start)
    }

    pub fn ends_at(&self) -> u64 {
        self.bucket_start + self.duration_secs
    }

    pub fn is_settled(&self) -> bool {
        self.status == RoundStatus::Settled
    }

    pub fn total_wagered(&self) -> u64 {
        self.totals.values().sum()
    }

    /// Apply a reveal, freezing `totals` as they stand
    pub fn settle_with(&mut self, settlement: &Settlement) {
        self.status = RoundStatus::Settled;
        self.seed_revealed = Some(settlement.seed_revealed.clone());
        self.outcome = Some(settlement.outcome.clone());
        self.settled_at_ms = Some(settlement.settled_at_ms);
    }
}

/// One accepted bet. Never modified after it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Play {
    pub play_id: Uuid,
    pub game_id: String,
    pub bucket_start: u64,
    pub user_id: String,
    pub bet_amount: u64,
    pub choice: String,
    pub timestamp_ms: u64,
}

impl Play {
    pub fn round_key(&self) -> RoundKey {
        RoundKey::new(self.game_id.clone(), self.bucket_start)
    }
}

/// Reveal written by the conditional pending -> settled transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub seed_revealed: String,
    pub outcome: Outcome,
    pub settled_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameKnobs;

    #[test]
    fn test_pending_round_serializes_without_reveal() {
        let game = Game {
            id: "dice".to_string(),
            name: "Dice".to_string(),
            round_duration_secs: 60,
            min_bet: 10,
            max_bet: 1000,
            knobs: GameKnobs::HighLow,
        };
        let round = Round::pending(&game, 120, "ab".repeat(32), 120_000);
        let json = serde_json::to_value(&round).unwrap();

        assert_eq!(json["status"], "pending");
        assert!(json.get("seed_revealed").is_none());
        assert!(json.get("outcome").is_none());
        assert_eq!(round.ends_at(), 180);

        let back: Round = serde_json::from_value(json).unwrap();
        assert_eq!(back, round);
    }

    #[test]
    fn test_settle_with_keeps_commitment_and_totals() {
        let mut round = Round {
            game_id: "dice".to_string(),
            bucket_start: 0,
            duration_secs: 60,
            status: RoundStatus::Pending,
            seed_hash: "00".repeat(32),
            seed_revealed: None,
            outcome: None,
            totals: Totals::from([("high".to_string(), 100), ("low".to_string(), 50)]),
            created_at_ms: 0,
            settled_at_ms: None,
        };
        round.settle_with(&Settlement {
            seed_revealed: "11".repeat(32),
            outcome: Outcome {
                draws: vec![1],
                winning: vec!["high".to_string()],
            },
            settled_at_ms: 65_000,
        });

        assert!(round.is_settled());
        assert_eq!(round.seed_hash, "00".repeat(32));
        assert_eq!(round.total_wagered(), 150);
        assert_eq!(round.settled_at_ms, Some(65_000));
    }
}
