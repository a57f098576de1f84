use async_trait::async_trait;
use cozy_chess::{Board, Move};
use log::debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::board::Position;
use crate::error::OracleError;
use crate::oracle::{terminal_evaluation, Evaluation, SearchOracle};
use crate::search::{SearchParams, SearchResult, Searcher};

#[derive(Debug, Clone, Copy)]
pub struct BuiltinSettings {
    /// Depth cap for timed searches; the budget normally stops them first.
    pub max_depth: u32,
    pub eval_depth: u32,
    pub threads: usize,
    pub hash_mb: usize,
}

impl Default for BuiltinSettings {
    fn default() -> Self {
        Self { max_depth: 64, eval_depth: 5, threads: 1, hash_mb: 16 }
    }
}

/// The in-process alpha-beta searcher as a search oracle. One searcher (and
/// its transposition table) lives for the whole process; requests take turns
/// on it from the blocking pool.
pub struct AlphaBetaOracle {
    searcher: Arc<Mutex<Searcher>>,
    settings: BuiltinSettings,
}

impl AlphaBetaOracle {
    pub fn new(settings: BuiltinSettings) -> Self {
        let mut s = Searcher::default();
        s.set_tt_capacity_mb(settings.hash_mb);
        Self { searcher: Arc::new(Mutex::new(s)), settings }
    }

    async fn run(&self, board: Board, params: SearchParams) -> Result<SearchResult, OracleError> {
        let searcher = self.searcher.clone();
        tokio::task::spawn_blocking(move || {
            let mut s = searcher.lock().map_err(|_| OracleError::Poisoned)?;
            Ok(s.search_with_params(&board, params))
        })
        .await?
    }
}

impl Default for AlphaBetaOracle {
    fn default() -> Self { Self::new(BuiltinSettings::default()) }
}

#[async_trait]
impl SearchOracle for AlphaBetaOracle {
    async fn best_move(&self, position: &Position, budget: Duration) -> Result<Move, OracleError> {
        let params = SearchParams {
            depth: self.settings.max_depth,
            movetime: Some(budget),
            threads: self.settings.threads,
            ..SearchParams::default()
        };
        let r = self.run(position.board().clone(), params).await?;
        debug!("search: depth {} nodes {} score {}cp", r.depth, r.nodes, r.score_cp);
        r.bestmove.ok_or(OracleError::NoMove)
    }

    async fn evaluate(&self, position: &Position) -> Result<Evaluation, OracleError> {
        if let Some(e) = terminal_evaluation(position) { return Ok(e); }
        let params = SearchParams {
            depth: self.settings.eval_depth,
            threads: self.settings.threads,
            ..SearchParams::default()
        };
        let r = self.run(position.board().clone(), params).await?;
        Ok(Evaluation::from_side_cp(position.side_to_move(), r.score_cp))
    }
}
