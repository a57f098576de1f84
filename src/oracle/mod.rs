//! Search and predictive oracles: the two move/evaluation capabilities the
//! arbiter reconciles.

use async_trait::async_trait;
use cozy_chess::{Color, Move};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::board::{Position, Termination};
use crate::error::OracleError;

pub mod builtin;
pub mod net;
pub mod uci;

pub use builtin::AlphaBetaOracle;
pub use net::NetOracle;
pub use uci::UciEngineOracle;

/// Signed centipawns, positive favors White. Mate scores are clamped so the
/// value is always finite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evaluation(i32);

impl Evaluation {
    pub const EVEN: Evaluation = Evaluation(0);
    pub const MAX_CP: i32 = 10_000;

    pub fn from_cp(cp: i32) -> Self { Evaluation(cp.clamp(-Self::MAX_CP, Self::MAX_CP)) }

    pub fn from_pawns(pawns: f64) -> Self {
        if pawns.is_finite() { Self::from_cp((pawns * 100.0).round() as i32) } else { Self::EVEN }
    }

    /// `cp` is given from `side`'s point of view.
    pub fn from_side_cp(side: Color, cp: i32) -> Self {
        Self::from_cp(if side == Color::White { cp } else { -cp })
    }

    pub fn cp(self) -> i32 { self.0 }
    pub fn pawns(self) -> f64 { self.0 as f64 / 100.0 }

    /// Centipawns from `side`'s point of view.
    pub fn for_side(self, side: Color) -> i32 {
        if side == Color::White { self.0 } else { -self.0 }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.2}", self.pawns())
    }
}

/// Evaluation of a finished position, if it is one: mate scores the maximum
/// against the mated side, every draw is even.
pub fn terminal_evaluation(position: &Position) -> Option<Evaluation> {
    position.termination().map(|t| match t {
        Termination::Checkmate { mated } => Evaluation::from_side_cp(mated, -Evaluation::MAX_CP),
        _ => Evaluation::EVEN,
    })
}

/// Exact search engine with bounded latency.
#[async_trait]
pub trait SearchOracle: Send + Sync {
    async fn best_move(&self, position: &Position, budget: Duration) -> Result<Move, OracleError>;

    /// Fixed-depth evaluation of `position`.
    async fn evaluate(&self, position: &Position) -> Result<Evaluation, OracleError>;

    async fn shutdown(&self) -> Result<(), OracleError> { Ok(()) }
}

/// Learned model; may be absent or untrained.
#[async_trait]
pub trait PredictiveOracle: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn predict_move(&self, position: &Position) -> Result<Option<Move>, OracleError>;

    /// Value of the position reached by `mv`.
    async fn evaluate_move(&self, position: &Position, mv: Move) -> Result<Evaluation, OracleError>;

    /// Pick up refreshed weights. Returns whether a model is now loaded.
    async fn reload(&self) -> Result<bool, OracleError> { Ok(self.is_ready()) }
}

/// Stand-in used when no model is configured.
pub struct NoModel;

#[async_trait]
impl PredictiveOracle for NoModel {
    fn is_ready(&self) -> bool { false }

    async fn predict_move(&self, _position: &Position) -> Result<Option<Move>, OracleError> { Ok(None) }

    async fn evaluate_move(&self, _position: &Position, _mv: Move) -> Result<Evaluation, OracleError> {
        Err(OracleError::Unavailable("no model loaded".into()))
    }
}
