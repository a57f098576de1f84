//! Everything that happens after a game ends: tally, persistence, analysis
//! and the periodic retraining trigger.

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::record::{GameRecord, GameResult};

pub mod analysis;
pub mod shards;
pub mod store;

pub use analysis::{GameAnalysis, GameAnalyzer};
pub use shards::{Retrainer, ShardExporter};
pub use store::{GameStore, JsonlGameStore};

/// Running win/loss/draw tally. Games with an unknown result count as
/// played only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRecord {
    pub games_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
}

impl BotRecord {
    pub fn record(&mut self, result: GameResult) {
        self.games_played += 1;
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
            GameResult::Unknown => {}
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 { 0.0 } else { self.wins as f64 / self.games_played as f64 }
    }
}

#[async_trait]
pub trait PostGamePipeline: Send + Sync {
    /// Never fails outward; every stage logs its own faults.
    async fn handle_finished_game(&self, record: GameRecord, tally: &mut BotRecord);

    /// Flushes anything still pending and releases the store.
    async fn shutdown(&self) {}
}

#[derive(Default)]
struct PipelineState {
    // Records the store has not accepted yet, oldest first.
    pending: Vec<GameRecord>,
}

pub struct LearningPipeline {
    store: Arc<dyn GameStore>,
    analyzer: GameAnalyzer,
    retrainer: Option<Retrainer>,
    retrain_every: u64,
    state: Mutex<PipelineState>,
}

impl LearningPipeline {
    /// Retraining runs whenever the overall game count (the tally, seeded
    /// from the store) reaches a multiple of `retrain_every`.
    pub fn new(
        store: Arc<dyn GameStore>,
        analyzer: GameAnalyzer,
        retrainer: Option<Retrainer>,
        retrain_every: u64,
    ) -> Self {
        Self {
            store,
            analyzer,
            retrainer,
            retrain_every: retrain_every.max(1),
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Number of records waiting for the store.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    fn flush(&self, pending: &mut Vec<GameRecord>) {
        while let Some(record) = pending.first() {
            match self.store.save_game(record) {
                Ok(()) => {
                    info!("game {} saved", record.game_id);
                }
                Err(StoreError::DuplicateGame(id)) => {
                    warn!("game {id} was already stored, dropping the copy");
                }
                Err(e) => {
                    warn!("saving game {} failed, {} record(s) kept for retry: {e}", record.game_id, pending.len());
                    return;
                }
            }
            pending.remove(0);
        }
    }
}

#[async_trait]
impl PostGamePipeline for LearningPipeline {
    async fn handle_finished_game(&self, record: GameRecord, tally: &mut BotRecord) {
        tally.record(record.result);

        let mut state = self.state.lock().await;
        state.pending.push(record.clone());
        self.flush(&mut state.pending);
        drop(state);

        let analysis = self.analyzer.analyze(&record);

        let played = tally.games_played;
        if played % self.retrain_every == 0 {
            if let Some(retrainer) = &self.retrainer {
                match retrainer.retrain().await {
                    Ok(n) => info!("retraining round at {played} games: {n} shard(s) exported"),
                    Err(e) => warn!("retraining failed: {e:#}"),
                }
            }
        }

        info!(
            "record {}W/{}L/{}D over {} games ({:.1}% wins); last game {} mistakes, {} blunders",
            tally.wins,
            tally.losses,
            tally.draws,
            tally.games_played,
            tally.win_rate() * 100.0,
            analysis.mistakes,
            analysis.blunders
        );
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        self.flush(&mut state.pending);
        if !state.pending.is_empty() {
            warn!("{} game record(s) could not be saved before shutdown", state.pending.len());
        }
        if let Err(e) = self.store.close() {
            warn!("closing the game store failed: {e}");
        }
    }
}
