//! Seed derivation and commitment
//!
//! `seed = HMAC-SHA256(secret, "game_id:bucket_start")`, published only after
//! settlement; `seed_hash = SHA256(seed)` is published when the round opens.

use crate::errors::VerificationError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const SEED_DERIVATION: &str = "seed = HMAC-SHA256(server_secret, game_id + \":\" + bucket_start)";
pub const COMMITMENT_HASH: &str = "seed_hash = SHA256(seed)";

/// 32-byte outcome-determining seed of one round
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Seed([u8; 32]);

impl Seed {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> Result<Self, VerificationError> {
        decode_32("seed", value).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Public commitment to this seed
    pub fn commitment(&self) -> SeedHash {
        let digest: [u8; 32] = Sha256::digest(self.0).into();
        SeedHash(digest)
    }
}

// Seeds stay private until settlement, keep them out of logs.
impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(..)")
    }
}

/// SHA-256 of a seed, published at round creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHash([u8; 32]);

impl SeedHash {
    pub fn from_hex(value: &str) -> Result<Self, VerificationError> {
        decode_32("seed_hash", value).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

fn decode_32(field: &str, value: &str) -> Result<[u8; 32], VerificationError> {
    let bytes = hex::decode(value.trim()).map_err(|e| VerificationError::InvalidHex {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| VerificationError::InvalidLength {
            field: field.to_string(),
            len,
        })
}

/// Message fed to the MAC for a round
pub fn seed_message(game_id: &str, bucket_start: u64) -> String {
    format!("{}:{}", game_id, bucket_start)
}

/// Seed derivation keyed by the server secret.
///
/// Identical `(secret, game_id, bucket_start)` always yields the identical
/// seed, so the seed never has to be stored before it is revealed.
pub struct SeedCommitment {
    secret: Vec<u8>,
}

impl SeedCommitment {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn derive_seed(&self, game_id: &str, bucket_start: u64) -> Seed {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(seed_message(game_id, bucket_start).as_bytes());
        Seed(mac.finalize().into_bytes().into())
    }

    /// Hash published before any bet on the round is accepted
    pub fn commit(&self, game_id: &str, bucket_start: u64) -> SeedHash {
        self.derive_seed(game_id, bucket_start).commitment()
    }
}

impl fmt::Debug for SeedCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedCommitment")
            .field("secret_len", &self.secret.len())
            .finish()
    }
}

/// Check a revealed seed against its published hash
pub fn verify_commitment(seed: &Seed, seed_hash: &SeedHash) -> bool {
    seed.commitment() == *seed_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_derivation_is_deterministic() {
        let commitment = SeedCommitment::new(b"server-secret-for-tests".to_vec());
        let a = commitment.derive_seed("dice", 1_700_000_040);
        let b = commitment.derive_seed("dice", 1_700_000_040);
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_depends_on_all_inputs() {
        let commitment = SeedCommitment::new(b"server-secret-for-tests".to_vec());
        let base = commitment.derive_seed("dice", 60);
        assert_ne!(base, commitment.derive_seed("dice", 120));
        assert_ne!(base, commitment.derive_seed("coinflip", 60));

        let other = SeedCommitment::new(b"another-secret-entirely".to_vec());
        assert_ne!(base, other.derive_seed("dice", 60));
    }

    #[test]
    fn test_matches_plain_hmac() {
        let commitment = SeedCommitment::new(b"key".to_vec());
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"dice:60");
        let expected: [u8; 32] = mac.finalize().into_bytes().into();
        assert_eq!(commitment.derive_seed("dice", 60).as_bytes(), &expected);
    }

    #[test]
    fn test_commitment_verifies() {
        let commitment = SeedCommitment::new(b"server-secret-for-tests".to_vec());
        let seed = commitment.derive_seed("dice", 60);
        let hash = commitment.commit("dice", 60);

        assert!(verify_commitment(&seed, &hash));
        let wrong = commitment.derive_seed("dice", 120);
        assert!(!verify_commitment(&wrong, &hash));
    }

    #[test]
    fn test_hex_round_trip_and_errors() {
        let seed = SeedCommitment::new(b"k".to_vec()).derive_seed("dice", 0);
        assert_eq!(Seed::from_hex(&seed.to_hex()).unwrap(), seed);

        assert!(matches!(
            Seed::from_hex("zz"),
            Err(VerificationError::InvalidHex { .. })
        ));
        assert_eq!(
            SeedHash::from_hex("abcd"),
            Err(VerificationError::InvalidLength {
                field: "seed_hash".to_string(),
                len: 2
            })
        );
    }

    #[test]
    fn test_debug_hides_seed() {
        let seed = SeedCommitment::new(b"k".to_vec()).derive_seed("dice", 0);
        assert_eq!(format!("{:?}", seed), "Seed(..)");
    }
}
