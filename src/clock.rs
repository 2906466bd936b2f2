//! Server time source and round buckets
//!
//! Every component reads time through one shared [`Clock`] so that the
//! commitment, bet acceptance and settlement paths agree on bucket boundaries.
//! Client-supplied timestamps are never consulted.

use crate::games::Game;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Monotonic-enough wall clock in unix milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;

    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// Wall clock backed by `SystemTime`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Settable clock for tests and replay tooling
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn at_secs(secs: u64) -> Self {
        Self {
            millis: AtomicU64::new(secs * 1000),
        }
    }

    pub fn set_secs(&self, secs: u64) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// One fixed-width round window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub start: u64,
    pub duration_secs: u64,
    pub seconds_remaining: u64,
}

impl Bucket {
    /// First second that no longer belongs to this bucket
    pub fn end(&self) -> u64 {
        self.start + self.duration_secs
    }
}

/// Pure bucket computation for a given instant.
///
/// `bucket_start = floor(now / d) * d`, `seconds_remaining = d - (now - bucket_start)`.
pub fn bucket_at(now_secs: u64, duration_secs: u64) -> Bucket {
    let duration_secs = duration_secs.max(1);
    let start = (now_secs / duration_secs) * duration_secs;
    Bucket {
        start,
        duration_secs,
        seconds_remaining: duration_secs - (now_secs - start),
    }
}

/// Maps the shared clock onto per-game buckets
#[derive(Clone)]
pub struct BucketClock {
    clock: Arc<dyn Clock>,
}

impl BucketClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    /// Bucket that contains "now" for this game
    pub fn current_bucket(&self, game: &Game) -> Bucket {
        bucket_at(self.now_secs(), game.round_duration_secs)
    }

    /// Seconds left in an arbitrary bucket, zero once it has closed
    pub fn seconds_remaining(&self, game: &Game, bucket_start: u64) -> u64 {
        (bucket_start + game.round_duration_secs).saturating_sub(self.now_secs())
    }

    /// True once `now >= bucket_start + duration`
    pub fn has_closed(&self, game: &Game, bucket_start: u64) -> bool {
        self.now_millis() >= (bucket_start + game.round_duration_secs) * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{Game, GameKnobs};

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

    #[test]
    fn test_bucket_alignment() {
        let bucket = bucket_at(1_700_000_005, 60);
        assert_eq!(bucket.start % 60, 0);
        assert!(bucket.start <= 1_700_000_005);
        assert_eq!(bucket.seconds_remaining, 60 - (1_700_000_005 - bucket.start));
    }

    #[test]
    fn test_bucket_is_deterministic() {
        assert_eq!(bucket_at(12_345, 30), bucket_at(12_345, 30));
    }

    #[test]
    fn test_bucket_boundaries() {
        let at_start = bucket_at(120, 60);
        assert_eq!(at_start.start, 120);
        assert_eq!(at_start.seconds_remaining, 60);

        let last_second = bucket_at(179, 60);
        assert_eq!(last_second.start, 120);
        assert_eq!(last_second.seconds_remaining, 1);
        assert_eq!(last_second.end(), 180);
    }

    #[test]
    fn test_has_closed_uses_millisecond_precision() {
        let clock = Arc::new(ManualClock::at_secs(120));
        let buckets = BucketClock::new(clock.clone());
        let game = dice();

        clock.set_millis(179_999);
        assert!(!buckets.has_closed(&game, 120));
        assert_eq!(buckets.seconds_remaining(&game, 120), 1);

        clock.set_millis(180_000);
        assert!(buckets.has_closed(&game, 120));
        assert_eq!(buckets.seconds_remaining(&game, 120), 0);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_secs(10);
        clock.advance_secs(5);
        assert_eq!(clock.now_secs(), 15);
        assert_eq!(clock.now_millis(), 15_000);
    }
}
