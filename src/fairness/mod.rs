//! Commit-reveal primitives
//!
//! Seeds are derived from the server secret, committed to by hash when a round
//! opens, and revealed after settlement. Outcomes come from a hash-based
//! random stream over the revealed seed, so anyone holding the seed can replay
//! them.

pub mod commitment;
pub mod random_stream;

pub use commitment::{seed_message, verify_commitment, Seed, SeedCommitment, SeedHash};
pub use random_stream::{draw, RandomStream};
