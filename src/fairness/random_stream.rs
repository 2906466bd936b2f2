use super::commitment::Seed;
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;

pub const RNG_FORMULA: &str =
    "rand(seed, cursor, N) = floor(uint32_be(SHA256(seed || uint32_be(cursor))[0..4]) / 2^32 * N)";

/// Single draw in `[0, n)` for a `(seed, cursor)` pair.
///
/// The division by 2^32 is done in integer arithmetic so every verifier gets
/// the same answer regardless of floating point behaviour.
pub fn draw(seed: &Seed, cursor: u32, n: NonZeroU32) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(cursor.to_be_bytes());
    let digest = hasher.finalize();

    let x = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    ((u64::from(x) * u64::from(n.get())) >> 32) as u32
}

/// Successive independent draws from one seed, cursor starting at 0
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: Seed,
    cursor: u32,
}

impl RandomStream {
    pub fn new(seed: Seed) -> Self {
        Self { seed, cursor: 0 }
    }

    pub fn next(&mut self, n: NonZeroU32) -> u32 {
        let value = draw(&self.seed, self.cursor, n);
        self.cursor += 1;
        value
    }

    /// Number of draws taken so far
    pub fn cursor(&self) -> u32 {
        self.cursor
    }
}
