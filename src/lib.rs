//! Fairround - provably-fair round-based wagering
//!
//! Games run in fixed-duration rounds aligned to wall-clock buckets. When a
//! round opens, the server publishes `SHA256(seed)` where
//! `seed = HMAC-SHA256(secret, "game_id:bucket_start")`. Bets are accepted
//! until the bucket ends; the first access afterwards settles the round,
//! reveals the seed and stores the outcome drawn from it. Anyone can then
//! recompute both the hash and the outcome.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fairness;
pub mod games;
pub mod metrics;
pub mod rounds;
pub mod storage;

pub use clock::{Bucket, BucketClock, Clock, ManualClock, SystemClock};
pub use config::{ConfigLoader, FairroundConfig};
pub use engine::{GameSummary, RoundView, WageringEngine};
pub use errors::{FairroundError, FairroundResult};
pub use games::{Game, GameCatalog, GameKnobs, Outcome};
pub use rounds::{PayoutRule, Play, PlayReceipt, PlayRequest, Round, RoundStatus};
pub use storage::{MemoryRoundStore, RocksRoundStore, RoundRepository};
