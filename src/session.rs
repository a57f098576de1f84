//! Drives one game from assignment to a finished record.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::arbiter::Arbiter;
use crate::board::{color_name, Position};
use crate::client::{GameAssignment, GameClient};
use crate::config::SessionConfig;
use crate::error::{BoardError, SessionError};
use crate::oracle::{Evaluation, SearchOracle};
use crate::pipeline::{BotRecord, PostGamePipeline};
use crate::record::{render_pgn, GameRecord, GameResult, PgnHeaders};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Assigned,
    InProgress,
    Terminal,
}

/// Mutable state of the game being played. Owned by the controller for the
/// length of one game.
#[derive(Debug)]
pub struct GameSession {
    pub assignment: GameAssignment,
    pub position: Position,
    /// Seconds per own move.
    pub move_times: Vec<f64>,
    /// One entry per applied half-move.
    pub evaluations: Vec<Evaluation>,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    pub result: Option<GameResult>,
    pub termination: Option<String>,
    clock: Instant,
}

impl GameSession {
    pub fn new(assignment: GameAssignment) -> Result<Self, BoardError> {
        let position = match &assignment.initial_fen {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::startpos(),
        };
        Ok(Self {
            assignment,
            position,
            move_times: Vec::new(),
            evaluations: Vec::new(),
            started_at: Utc::now(),
            state: SessionState::Assigned,
            result: None,
            termination: None,
            clock: Instant::now(),
        })
    }

    pub fn moves(&self) -> Vec<String> { self.position.uci_history() }

    fn finish(&mut self, result: GameResult, reason: String) {
        self.state = SessionState::Terminal;
        self.result = Some(result);
        self.termination = Some(reason);
    }

    pub fn into_record(self, cfg: &SessionConfig) -> GameRecord {
        let color = self.assignment.color;
        let result = self.result.unwrap_or(GameResult::Unknown);
        let headers = PgnHeaders {
            event: &cfg.event,
            site: &cfg.site,
            date: self.started_at,
            round: "-",
            white: &self.assignment.white_name,
            black: &self.assignment.black_name,
            result: result.pgn_token(color),
        };
        let pgn = render_pgn(&headers, &self.position);
        GameRecord {
            game_id: self.assignment.id.clone(),
            opponent: self.assignment.opponent.clone(),
            color: color_name(color).to_string(),
            result,
            moves: self.position.uci_history(),
            move_times: self.move_times,
            evaluations: self.evaluations.iter().map(|e| e.pawns()).collect(),
            pgn,
            duration: self.clock.elapsed().as_secs_f64(),
            started_at: self.started_at,
            termination: self.termination,
            initial_fen: self.assignment.initial_fen,
        }
    }
}

pub struct SessionController {
    client: Arc<dyn GameClient>,
    arbiter: Arc<Arbiter>,
    engine: Arc<dyn SearchOracle>,
    pipeline: Arc<dyn PostGamePipeline>,
    config: SessionConfig,
}

impl SessionController {
    pub fn new(
        client: Arc<dyn GameClient>,
        arbiter: Arc<Arbiter>,
        engine: Arc<dyn SearchOracle>,
        pipeline: Arc<dyn PostGamePipeline>,
        config: SessionConfig,
    ) -> Self {
        Self { client, arbiter, engine, pipeline, config }
    }

    /// Plays `assignment` to the end and hands the record to the pipeline.
    /// Errors end the session without a hand-off.
    pub async fn play(
        &self,
        assignment: GameAssignment,
        tally: &mut BotRecord,
    ) -> Result<GameResult, SessionError> {
        let id = assignment.id.clone();
        info!("game {id}: playing {} against {}", color_name(assignment.color), assignment.opponent);
        let mut session = GameSession::new(assignment)?;
        if let Err(e) = self.run(&mut session).await {
            error!(
                "game {id}: aborted while {:?} after {} half-moves: {e}",
                session.state,
                session.position.played().len()
            );
            return Err(e);
        }
        let record = session.into_record(&self.config);
        let result = record.result;
        info!(
            "game {id}: {result} ({}) after {} half-moves",
            record.termination.as_deref().unwrap_or("-"),
            record.moves.len()
        );
        self.pipeline.handle_finished_game(record, tally).await;
        Ok(result)
    }

    async fn run(&self, session: &mut GameSession) -> Result<(), SessionError> {
        session.state = SessionState::InProgress;
        let id = session.assignment.id.clone();
        let color = session.assignment.color;
        let mut silent = 0u32;
        loop {
            if let Some(t) = session.position.termination() {
                session.finish(GameResult::from_termination(t, color), t.to_string());
                return Ok(());
            }
            if session.position.side_to_move() == color {
                let t0 = Instant::now();
                let choice = self.arbiter.choose_move(&session.position).await?;
                let took = t0.elapsed().as_secs_f64();
                let uci = session.position.to_uci(choice.mv);
                session.position.play(choice.mv)?;
                if !self.client.submit_move(&id, &uci).await? {
                    return Err(SessionError::MoveRejected { game_id: id, uci });
                }
                session.move_times.push(took);
                let eval = self.evaluate(session).await;
                session.evaluations.push(eval);
                debug!("game {id}: played {uci} via {} in {took:.3}s, eval {eval}", choice.source);
            } else {
                let Some(text) = self.client.await_opponent_move(&id, self.config.opponent_wait()).await? else {
                    silent += 1;
                    if silent >= self.config.max_silent_waits {
                        warn!("game {id}: no opponent move after {silent} waits, resigning");
                        self.client.resign(&id).await?;
                        return Err(SessionError::OpponentSilent { game_id: id, waits: silent });
                    }
                    continue;
                };
                silent = 0;
                match session.position.parse_uci(&text) {
                    Ok(mv) => session.position.play(mv)?,
                    Err(e) => {
                        warn!("game {id}: opponent sent unusable move '{text}': {e}");
                        session.finish(GameResult::Unknown, format!("invalid opponent move {text}"));
                        return Ok(());
                    }
                }
                let eval = self.evaluate(session).await;
                session.evaluations.push(eval);
                debug!("game {id}: opponent played {text}, eval {eval}");
            }
        }
    }

    // An engine fault here repeats the previous value rather than ending the game.
    async fn evaluate(&self, session: &GameSession) -> Evaluation {
        match self.engine.evaluate(&session.position).await {
            Ok(e) => e,
            Err(e) => {
                warn!("game {}: evaluation failed: {e}", session.assignment.id);
                session.evaluations.last().copied().unwrap_or(Evaluation::EVEN)
            }
        }
    }
}
