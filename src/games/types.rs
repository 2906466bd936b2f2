use crate::{errors::ConfigurationError, fairness::RandomStream};
use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroU32};

/// Upper bound on lottery pool size, keeps settlement allocation bounded
pub const MAX_LOTTERY_POOL: u32 = 10_000;

const HIGH_LOW: [&str; 2] = ["low", "high"];
const COIN: [&str; 2] = ["heads", "tails"];

/// Public per-game parameters, one variant per game kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameKnobs {
    /// One draw over 2: 0 = "low", 1 = "high"
    HighLow,
    /// One draw over 2: 0 = "heads", 1 = "tails"
    CoinFlip,
    /// One draw over the segment count, landing on `segments[draw]`
    Wheel { segments: Vec<String> },
    /// `picks` distinct numbers out of `1..=pool`
    Lottery { pool: u32, picks: u32 },
}

impl fmt::Display for GameKnobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKnobs::HighLow => write!(f, "high_low"),
            GameKnobs::CoinFlip => write!(f, "coin_flip"),
            GameKnobs::Wheel { segments } => write!(f, "wheel({} segments)", segments.len()),
            GameKnobs::Lottery { pool, picks } => write!(f, "lottery({} of {})", picks, pool),
        }
    }
}

/// Draw results and the choices they make win
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    /// Raw RandomStream values, cursor order
    pub draws: Vec<u32>,
    pub winning: Vec<String>,
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

impl GameKnobs {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            GameKnobs::HighLow | GameKnobs::CoinFlip => Ok(()),
            GameKnobs::Wheel { segments } => {
                if segments.is_empty() {
                    return Err("wheel needs at least one segment".to_string());
                }
                if segments.iter().any(|s| s.trim().is_empty()) {
                    return Err("wheel segments cannot be blank".to_string());
                }
                let mut sorted = segments.clone();
                sorted.sort();
                sorted.dedup();
                if sorted.len() != segments.len() {
                    return Err("wheel segments must be unique".to_string());
                }
                Ok(())
            }
            GameKnobs::Lottery { pool, picks } => {
                if *pool == 0 || *pool > MAX_LOTTERY_POOL {
                    return Err(format!("lottery pool must be in 1..={}", MAX_LOTTERY_POOL));
                }
                if *picks == 0 || picks > pool {
                    return Err("lottery picks must be in 1..=pool".to_string());
                }
                Ok(())
            }
        }
    }

    /// Every choice a play may name
    pub fn choices(&self) -> Vec<String> {
        match self {
            GameKnobs::HighLow => HIGH_LOW.iter().map(|s| s.to_string()).collect(),
            GameKnobs::CoinFlip => COIN.iter().map(|s| s.to_string()).collect(),
            GameKnobs::Wheel { segments } => segments.clone(),
            GameKnobs::Lottery { pool, .. } => (1..=*pool).map(|n| n.to_string()).collect(),
        }
    }

    /// Normalized form of a submitted choice, `None` if the game does not offer it
    pub fn canonical_choice(&self, choice: &str) -> Option<String> {
        let choice = choice.trim();
        match self {
            GameKnobs::HighLow => lookup_label(&HIGH_LOW, choice),
            GameKnobs::CoinFlip => lookup_label(&COIN, choice),
            GameKnobs::Wheel { segments } => segments.iter().find(|s| *s == choice).cloned(),
            GameKnobs::Lottery { pool, .. } => choice
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=*pool).contains(n))
                .map(|n| n.to_string()),
        }
    }

    /// Number of RandomStream draws one settlement consumes
    pub fn draws_required(&self) -> u32 {
        match self {
            GameKnobs::Lottery { picks, .. } => *picks,
            _ => 1,
        }
    }

    /// Run the stream to produce this game's outcome
    pub fn draw_outcome(&self, stream: &mut RandomStream) -> Outcome {
        match self {
            GameKnobs::HighLow => single_label(stream, &HIGH_LOW),
            GameKnobs::CoinFlip => single_label(stream, &COIN),
            GameKnobs::Wheel { segments } => {
                let d = stream.next(non_zero(segments.len() as u32));
                Outcome {
                    draws: vec![d],
                    winning: vec![segments[d as usize].clone()],
                }
            }
            GameKnobs::Lottery { pool, picks } => {
                // Partial Fisher-Yates: draw i picks from the pool - i numbers left.
                let mut numbers: Vec<u32> = (1..=*pool).collect();
                let mut draws = Vec::with_capacity(*picks as usize);
                for i in 0..*picks {
                    let d = stream.next(non_zero(pool - i));
                    numbers.swap(i as usize, (i + d) as usize);
                    draws.push(d);
                }
                Outcome {
                    draws,
                    winning: numbers[..*picks as usize]
                        .iter()
                        .map(|n| n.to_string())
                        .collect(),
                }
            }
        }
    }

    /// Human-readable mapping from draws to the outcome
    pub fn outcome_rule(&self) -> String {
        match self {
            GameKnobs::HighLow => "winning = [\"low\", \"high\"][rand(seed, 0, 2)]".to_string(),
            GameKnobs::CoinFlip => "winning = [\"heads\", \"tails\"][rand(seed, 0, 2)]".to_string(),
            GameKnobs::Wheel { segments } => format!(
                "winning = segments[rand(seed, 0, {})]",
                segments.len()
            ),
            GameKnobs::Lottery { pool, picks } => format!(
                "numbers = [1..={pool}]; for i in 0..{picks}: swap(numbers[i], numbers[i + rand(seed, i, {pool} - i)]); winning = numbers[0..{picks}]"
            ),
        }
    }
}

fn lookup_label(labels: &[&str; 2], choice: &str) -> Option<String> {
    labels
        .iter()
        .find(|label| label.eq_ignore_ascii_case(choice))
        .map(|label| label.to_string())
}

fn single_label(stream: &mut RandomStream, labels: &[&str; 2]) -> Outcome {
    let d = stream.next(non_zero(2));
    Outcome {
        draws: vec![d],
        winning: vec![labels[d as usize].to_string()],
    }
}

/// Game definition, owned by configuration and immutable at runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub round_duration_secs: u64,
    pub min_bet: u64,
    pub max_bet: u64,
    pub knobs: GameKnobs,
}

impl Game {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field: &str, value: String, reason: &str| ConfigurationError::InvalidValue {
            field: format!("games.{}.{}", self.id, field),
            value,
            reason: reason.to_string(),
        };

        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "id",
                self.id.clone(),
                "Game ids use ASCII letters, digits, '-' and '_'",
            ));
        }
        if self.round_duration_secs == 0 {
            return Err(invalid("round_duration_secs", "0".to_string(), "Round duration must be positive"));
        }
        if self.min_bet == 0 || self.min_bet > self.max_bet {
            return Err(invalid(
                "min_bet",
                format!("{}..{}", self.min_bet, self.max_bet),
                "Bet bounds need 0 < min_bet <= max_bet",
            ));
        }
        self.knobs
            .validate()
            .map_err(|reason| invalid("knobs", self.knobs.to_string(), &reason))
    }

    pub fn bet_in_bounds(&self, amount: u64) -> bool {
        (self.min_bet..=self.max_bet).contains(&amount)
    }
}
