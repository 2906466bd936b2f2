//! Round lifecycle: creation with commitment, play acceptance, settlement
//! with reveal, and verification.

pub mod ledger;
pub mod lifecycle;
pub mod settlement;
pub mod sweeper;
pub mod types;
pub mod verification;

pub use ledger::{PlayLedger, PlayReceipt, PlayRequest};
pub use lifecycle::RoundLifecycleManager;
pub use settlement::{compute_outcome, NoopPayout, PayoutRule, SettlementEngine};
pub use sweeper::SettlementSweeper;
pub use types::{Play, Round, RoundKey, RoundStatus, Settlement, Totals};
pub use verification::{
    check_reveal, CheckRequest, Formulas, RecomputedCheck, VerificationReport, VerificationService,
};
