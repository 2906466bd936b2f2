//! Background settlement of expired rounds
//!
//! Lazy settlement on access is enough for correctness; the sweeper only
//! makes reveals show up for games nobody is polling.

use super::settlement::SettlementEngine;
use crate::games::GameCatalog;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

pub struct SettlementSweeper {
    settlement: Arc<SettlementEngine>,
    catalog: Arc<GameCatalog>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl SettlementSweeper {
    pub fn spawn(
        settlement: Arc<SettlementEngine>,
        catalog: Arc<GameCatalog>,
        interval: Duration,
    ) -> Arc<Self> {
        let sweeper = Arc::new(Self {
            settlement,
            catalog,
            interval,
            running: Arc::new(AtomicBool::new(true)),
        });

        sweeper.clone().spawn_task();
        sweeper
    }

    fn spawn_task(self: Arc<Self>) {
        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "Settlement sweeper started");
            let start = tokio::time::Instant::now() + self.interval;
            let mut tick = tokio::time::interval_at(start, self.interval);

            while self.running.load(Ordering::SeqCst) {
                tick.tick().await;
                let settled = self.sweep_once().await;
                if settled > 0 {
                    tracing::debug!("Sweeper settled {} rounds", settled);
                }
            }
            tracing::info!("Settlement sweeper stopped");
        });
    }

    /// One pass over every game. Returns the number of rounds settled.
    pub async fn sweep_once(&self) -> usize {
        let mut settled = 0;
        for game in self.catalog.iter() {
            match self.settlement.settle_expired(game).await {
                Ok(rounds) => settled += rounds.len(),
                Err(e) => {
                    tracing::warn!(game_id = %game.id, "Sweeper failed to settle expired rounds: {}", e);
                }
            }
        }
        settled
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
