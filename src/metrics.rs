//! Engine counters with Prometheus text export

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by the lifecycle, ledger and settlement paths
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub rounds_created: AtomicU64,
    /// Creations that lost the insert race and re-fetched
    pub round_creation_races: AtomicU64,
    pub plays_accepted: AtomicU64,
    pub plays_rejected: AtomicU64,
    pub wagered_total: AtomicU64,
    pub settlements: AtomicU64,
    /// Settle attempts that found the round already settled
    pub settlement_noops: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rounds_created: u64,
    pub round_creation_races: u64,
    pub plays_accepted: u64,
    pub plays_rejected: u64,
    pub wagered_total: u64,
    pub settlements: u64,
    pub settlement_noops: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_round_created(&self) {
        self.rounds_created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_creation_race(&self) {
        self.round_creation_races.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_play(&self, bet_amount: u64) {
        self.plays_accepted.fetch_add(1, Ordering::SeqCst);
        self.wagered_total.fetch_add(bet_amount, Ordering::SeqCst);
    }

    pub fn record_rejection(&self) {
        self.plays_rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_settlement(&self) {
        self.settlements.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_settlement_noop(&self) {
        self.settlement_noops.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_created: self.rounds_created.load(Ordering::SeqCst),
            round_creation_races: self.round_creation_races.load(Ordering::SeqCst),
            plays_accepted: self.plays_accepted.load(Ordering::SeqCst),
            plays_rejected: self.plays_rejected.load(Ordering::SeqCst),
            wagered_total: self.wagered_total.load(Ordering::SeqCst),
            settlements: self.settlements.load(Ordering::SeqCst),
            settlement_noops: self.settlement_noops.load(Ordering::SeqCst),
        }
    }

    /// Generate Prometheus metrics format
    pub fn to_prometheus_format(&self) -> String {
        let snap = self.snapshot();
        let counters = [
            ("rounds_created_total", "Rounds created with a published commitment", snap.rounds_created),
            ("round_creation_races_total", "Round creations resolved by re-fetch", snap.round_creation_races),
            ("plays_accepted_total", "Plays accepted into an open round", snap.plays_accepted),
            ("plays_rejected_total", "Plays rejected by validation or a closed bucket", snap.plays_rejected),
            ("wagered_total", "Sum of accepted bet amounts", snap.wagered_total),
            ("settlements_total", "Rounds settled and revealed", snap.settlements),
            ("settlement_noops_total", "Settle attempts on already-settled rounds", snap.settlement_noops),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP fairround_{name} {help}\n\
                 # TYPE fairround_{name} counter\n\
                 fairround_{name} {value}\n\n"
            ));
        }
        output
    }
}
