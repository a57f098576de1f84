//! Move selection: a chain of providers (model, then engine) backed by a
//! uniform random pick that cannot fail while a legal move exists.

use async_trait::async_trait;
use cozy_chess::Move;
use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::board::Position;
use crate::config::ArbiterConfig;
use crate::error::{ArbiterError, OracleError};
use crate::oracle::{Evaluation, PredictiveOracle, SearchOracle};

/// One link of the selection chain. `Ok(None)` passes to the next link; an
/// error abandons the chain in favor of the random fallback. Only search
/// faults surface as errors: the model link absorbs its own.
#[async_trait]
pub trait MoveProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_propose(&self, position: &Position) -> Result<Option<Move>, OracleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveChoice {
    pub mv: Move,
    pub source: &'static str,
}

/// Plays the model's move when the engine confirms it is not losing more
/// than `tolerance_cp` against the engine's own choice.
pub struct ModelProvider {
    model: Arc<dyn PredictiveOracle>,
    engine: Arc<dyn SearchOracle>,
    tolerance_cp: i32,
    reference_budget: Duration,
}

impl ModelProvider {
    pub fn new(
        model: Arc<dyn PredictiveOracle>,
        engine: Arc<dyn SearchOracle>,
        tolerance_cp: i32,
        reference_budget: Duration,
    ) -> Self {
        Self { model, engine, tolerance_cp, reference_budget }
    }

    // The model's legal candidate and its evaluation.
    async fn candidate(&self, position: &Position) -> Result<Option<(Move, Evaluation)>, OracleError> {
        let Some(candidate) = self.model.predict_move(position).await? else { return Ok(None) };
        if !position.is_legal(candidate) {
            warn!("model proposed illegal move {candidate} in {}", position.fen());
            return Ok(None);
        }
        let eval = self.model.evaluate_move(position, candidate).await?;
        Ok(Some((candidate, eval)))
    }
}

#[async_trait]
impl MoveProvider for ModelProvider {
    fn name(&self) -> &'static str { "model" }

    async fn try_propose(&self, position: &Position) -> Result<Option<Move>, OracleError> {
        if !self.model.is_ready() { return Ok(None); }
        // A model fault only skips the model; the engine still gets its turn.
        let (candidate, model_eval) = match self.candidate(position).await {
            Ok(Some(c)) => c,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("model failed ({e}), asking the engine");
                return Ok(None);
            }
        };
        let mover = position.side_to_move();
        let reference = self.engine.best_move(position, self.reference_budget).await?;
        let engine_eval = self.engine.evaluate(&position.after(reference)?).await?;
        let margin = model_eval.for_side(mover) - engine_eval.for_side(mover);
        debug!(
            "model {} ({}) vs engine {} ({}): margin {margin}cp",
            position.to_uci(candidate),
            model_eval,
            position.to_uci(reference),
            engine_eval
        );
        Ok((margin >= -self.tolerance_cp).then_some(candidate))
    }
}

pub struct EngineProvider {
    engine: Arc<dyn SearchOracle>,
    budget: Duration,
}

impl EngineProvider {
    pub fn new(engine: Arc<dyn SearchOracle>, budget: Duration) -> Self {
        Self { engine, budget }
    }
}

#[async_trait]
impl MoveProvider for EngineProvider {
    fn name(&self) -> &'static str { "engine" }

    async fn try_propose(&self, position: &Position) -> Result<Option<Move>, OracleError> {
        self.engine.best_move(position, self.budget).await.map(Some)
    }
}

/// Uniform choice among the legal moves.
pub struct RandomProvider {
    rng: Mutex<SmallRng>,
}

impl RandomProvider {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    pub fn pick(&self, position: &Position) -> Option<Move> {
        let moves = position.legal_moves();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        moves.choose(&mut *rng).copied()
    }
}

#[async_trait]
impl MoveProvider for RandomProvider {
    fn name(&self) -> &'static str { "random" }

    async fn try_propose(&self, position: &Position) -> Result<Option<Move>, OracleError> {
        Ok(self.pick(position))
    }
}

pub struct Arbiter {
    chain: Vec<Box<dyn MoveProvider>>,
    fallback: RandomProvider,
}

impl Arbiter {
    /// The standard chain: model (verified with the short budget), then the
    /// engine with the long budget.
    pub fn new(
        model: Arc<dyn PredictiveOracle>,
        engine: Arc<dyn SearchOracle>,
        cfg: &ArbiterConfig,
    ) -> Self {
        let chain: Vec<Box<dyn MoveProvider>> = vec![
            Box::new(ModelProvider::new(model, engine.clone(), cfg.tolerance_cp, cfg.short_budget())),
            Box::new(EngineProvider::new(engine, cfg.long_budget())),
        ];
        Self::with_providers(chain, cfg.seed)
    }

    pub fn with_providers(chain: Vec<Box<dyn MoveProvider>>, seed: Option<u64>) -> Self {
        Self { chain, fallback: RandomProvider::new(seed) }
    }

    /// Always yields a legal move unless the position is terminal.
    pub async fn choose_move(&self, position: &Position) -> Result<MoveChoice, ArbiterError> {
        if !position.has_legal_moves() {
            return Err(ArbiterError::NoLegalMoves(position.fen()));
        }
        for provider in &self.chain {
            match provider.try_propose(position).await {
                Ok(Some(mv)) if position.is_legal(mv) => {
                    return Ok(MoveChoice { mv, source: provider.name() });
                }
                Ok(Some(mv)) => warn!("{} proposed illegal move {mv}, discarded", provider.name()),
                Ok(None) => {}
                Err(e) => {
                    warn!("{} failed ({e}), choosing a random move", provider.name());
                    break;
                }
            }
        }
        let mv = self.fallback.pick(position).ok_or_else(|| ArbiterError::NoLegalMoves(position.fen()))?;
        Ok(MoveChoice { mv, source: self.fallback.name() })
    }
}
