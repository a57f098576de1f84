use async_trait::async_trait;
use cozy_chess::Move;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::board::Position;
use crate::error::OracleError;
use crate::eval::ValueNet;
use crate::oracle::{terminal_evaluation, Evaluation, PredictiveOracle};

/// Predictive oracle backed by a value network. The predicted move is the
/// legal move whose resulting position the net likes best for the mover.
pub struct NetOracle {
    net: RwLock<Option<ValueNet>>,
    path: Option<PathBuf>,
}

impl NetOracle {
    /// Loads weights from `path`. A missing or unreadable file leaves the
    /// oracle not ready; `reload` retries the same path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let net = match ValueNet::load(&path) {
            Ok(n) => {
                info!("value net loaded from {} ({} inputs, {} hidden)", path.display(), n.meta.input_dim, n.meta.hidden_dim);
                Some(n)
            }
            Err(e) => {
                warn!("value net unavailable: {e:#}");
                None
            }
        };
        Self { net: RwLock::new(net), path: Some(path) }
    }

    pub fn with_net(net: ValueNet) -> Self {
        Self { net: RwLock::new(Some(net)), path: None }
    }

    fn score(&self, position: &Position) -> Result<Evaluation, OracleError> {
        if let Some(e) = terminal_evaluation(position) { return Ok(e); }
        let guard = self.net.read().map_err(|_| OracleError::Poisoned)?;
        let net = guard.as_ref().ok_or_else(|| OracleError::Unavailable("no value net loaded".into()))?;
        Ok(Evaluation::from_cp(net.evaluate(position.board())))
    }
}

#[async_trait]
impl PredictiveOracle for NetOracle {
    fn is_ready(&self) -> bool {
        self.net.read().map(|n| n.is_some()).unwrap_or(false)
    }

    async fn predict_move(&self, position: &Position) -> Result<Option<Move>, OracleError> {
        let mover = position.side_to_move();
        let mut best: Option<(i32, Move)> = None;
        for mv in position.legal_moves() {
            let v = self.score(&position.after(mv)?)?.for_side(mover);
            if best.map_or(true, |(b, _)| v > b) { best = Some((v, mv)); }
        }
        Ok(best.map(|(_, mv)| mv))
    }

    async fn evaluate_move(&self, position: &Position, mv: Move) -> Result<Evaluation, OracleError> {
        self.score(&position.after(mv)?)
    }

    async fn reload(&self) -> Result<bool, OracleError> {
        let Some(path) = &self.path else { return Ok(self.is_ready()) };
        let fresh = ValueNet::load(path).map_err(|e| OracleError::Unavailable(format!("{e:#}")))?;
        *self.net.write().map_err(|_| OracleError::Poisoned)? = Some(fresh);
        info!("value net reloaded from {}", path.display());
        Ok(true)
    }
}
