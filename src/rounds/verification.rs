//! Public verification of settled rounds
//!
//! Everything needed to replay a round is returned: the formulas, the game's
//! knobs and the stored round. For settled rounds the server also replays it
//! and reports whether the hash and outcome agree.

use super::{lifecycle::RoundLifecycleManager, settlement::compute_outcome, types::Round};
use crate::{
    errors::{FairroundResult, VerificationError},
    fairness::{
        commitment::{COMMITMENT_HASH, SEED_DERIVATION},
        random_stream::RNG_FORMULA,
        seed_message, verify_commitment, Seed, SeedHash,
    },
    games::{Game, GameKnobs, Outcome},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Derivation rules for one game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Formulas {
    pub seed_derivation: String,
    pub commitment_hash: String,
    pub rng: String,
    pub outcome_rule: String,
    /// Draws one settlement consumes, cursors `0..draws`
    pub draws: u32,
}

impl Formulas {
    pub fn for_knobs(knobs: &GameKnobs) -> Self {
        Self {
            seed_derivation: SEED_DERIVATION.to_string(),
            commitment_hash: COMMITMENT_HASH.to_string(),
            rng: RNG_FORMULA.to_string(),
            outcome_rule: knobs.outcome_rule(),
            draws: knobs.draws_required(),
        }
    }
}

/// Result of replaying a revealed seed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecomputedCheck {
    pub hash_matches: bool,
    /// `None` when no outcome was claimed
    pub outcome_matches: Option<bool>,
    pub recomputed_hash: String,
    pub recomputed_outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationReport {
    pub game_id: String,
    pub bucket_start: u64,
    /// Exact MAC input for this round
    pub seed_message: String,
    pub formulas: Formulas,
    pub knobs: GameKnobs,
    pub round: Round,
    /// Present once the round is settled
    pub check: Option<RecomputedCheck>,
}

/// Caller-supplied reveal to check without storage access
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRequest {
    pub game_id: String,
    pub seed: String,
    pub seed_hash: String,
    /// Winning choices the caller was shown
    #[serde(default)]
    pub outcome: Option<Vec<String>>,
}

/// Replay `seed_hex` under `knobs` and compare against a published hash and
/// optionally a claimed set of winning choices.
pub fn check_reveal(
    knobs: &GameKnobs,
    seed_hex: &str,
    seed_hash_hex: &str,
    claimed_winning: Option<&[String]>,
) -> Result<RecomputedCheck, VerificationError> {
    let seed = Seed::from_hex(seed_hex)?;
    let published = SeedHash::from_hex(seed_hash_hex)?;
    let recomputed_outcome = compute_outcome(knobs, seed);

    Ok(RecomputedCheck {
        hash_matches: verify_commitment(&seed, &published),
        outcome_matches: claimed_winning.map(|claimed| claimed == recomputed_outcome.winning.as_slice()),
        recomputed_hash: seed.commitment().to_hex(),
        recomputed_outcome,
    })
}

pub struct VerificationService {
    lifecycle: Arc<RoundLifecycleManager>,
}

impl VerificationService {
    pub fn new(lifecycle: Arc<RoundLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Formulas and stored state of one round, with a server-side replay
    /// when it is settled. Reading an expired round settles it.
    pub async fn verify(&self, game: &Game, bucket_start: u64) -> FairroundResult<VerificationReport> {
        let round = self.lifecycle.round_at(game, bucket_start).await?;

        let check = match (&round.seed_revealed, &round.outcome) {
            (Some(seed), Some(outcome)) => {
                let check = check_reveal(&game.knobs, seed, &round.seed_hash, Some(outcome.winning.as_slice()))?;
                if !check.hash_matches || check.outcome_matches != Some(true) {
                    tracing::error!(
                        game_id = %game.id,
                        bucket_start,
                        hash_matches = check.hash_matches,
                        "Stored round fails its own verification"
                    );
                }
                Some(check)
            }
            _ => None,
        };

        Ok(VerificationReport {
            game_id: game.id.clone(),
            bucket_start,
            seed_message: seed_message(&game.id, bucket_start),
            formulas: Formulas::for_knobs(&game.knobs),
            knobs: game.knobs.clone(),
            round,
            check,
        })
    }

    /// Stateless check of a caller-supplied reveal
    pub fn check(&self, game: &Game, request: &CheckRequest) -> Result<RecomputedCheck, VerificationError> {
        check_reveal(
            &game.knobs,
            &request.seed,
            &request.seed_hash,
            request.outcome.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::SeedCommitment;

    #[test]
    fn test_check_reveal_accepts_honest_reveal() {
        let commitment = SeedCommitment::new(b"verify-test-secret".to_vec());
        let seed = commitment.derive_seed("dice", 60);
        let hash = commitment.commit("dice", 60);
        let winning = compute_outcome(&GameKnobs::HighLow, seed).winning;

        let check = check_reveal(&GameKnobs::HighLow, &seed.to_hex(), &hash.to_hex(), Some(winning.as_slice())).unwrap();
        assert!(check.hash_matches);
        assert_eq!(check.outcome_matches, Some(true));
        assert_eq!(check.recomputed_hash, hash.to_hex());
    }

    #[test]
    fn test_check_reveal_detects_tampering() {
        let commitment = SeedCommitment::new(b"verify-test-secret".to_vec());
        let seed = commitment.derive_seed("dice", 60);
        let other_hash = commitment.commit("dice", 120);
        let wrong = vec!["nobody".to_string()];

        let check = check_reveal(&GameKnobs::HighLow, &seed.to_hex(), &other_hash.to_hex(), Some(wrong.as_slice())).unwrap();
        assert!(!check.hash_matches);
        assert_eq!(check.outcome_matches, Some(false));

        let unclaimed = check_reveal(&GameKnobs::HighLow, &seed.to_hex(), &other_hash.to_hex(), None).unwrap();
        assert_eq!(unclaimed.outcome_matches, None);
    }

    #[test]
    fn test_check_reveal_rejects_malformed_hex() {
        assert!(matches!(
            check_reveal(&GameKnobs::CoinFlip, "xyz", &"00".repeat(32), None),
            Err(VerificationError::InvalidHex { .. })
        ));
        assert!(matches!(
            check_reveal(&GameKnobs::CoinFlip, &"00".repeat(32), "00", None),
            Err(VerificationError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_formulas_name_the_game_rule() {
        let knobs = GameKnobs::Wheel {
            segments: vec!["red".to_string(), "black".to_string(), "green".to_string()],
        };
        let formulas = Formulas::for_knobs(&knobs);
        assert!(formulas.outcome_rule.contains("rand(seed, 0, 3)"));
        assert!(formulas.seed_derivation.contains("HMAC-SHA256"));
        assert_eq!(formulas.draws, 1);
        assert_eq!(Formulas::for_knobs(&GameKnobs::Lottery { pool: 49, picks: 6 }).draws, 6);
    }
}
