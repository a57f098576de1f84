#![allow(dead_code)]

use async_trait::async_trait;
use cozy_chess::{Color, Move};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use piebot_live::board::Position;
use piebot_live::client::{GameAssignment, GameClient};
use piebot_live::error::{ClientError, OracleError};
use piebot_live::oracle::{Evaluation, PredictiveOracle, SearchOracle};
use piebot_live::pipeline::{BotRecord, PostGamePipeline};
use piebot_live::record::GameRecord;

pub fn assignment(id: &str, color: Color, initial_fen: Option<&str>) -> GameAssignment {
    let (white, black) = if color == Color::White { ("bot", "opp") } else { ("opp", "bot") };
    GameAssignment {
        id: id.to_string(),
        opponent: "opp".to_string(),
        color,
        white_name: white.to_string(),
        black_name: black.to_string(),
        initial_fen: initial_fen.map(str::to_string),
    }
}

/// Search oracle double: plays queued moves (then the first legal move) and
/// reports a constant white-positive evaluation.
pub struct ScriptedEngine {
    moves: Mutex<VecDeque<String>>,
    pub eval_cp: i32,
    pub fail: bool,
    pub illegal: bool,
    pub best_calls: AtomicUsize,
    pub eval_calls: AtomicUsize,
    pub shut_down: AtomicBool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            moves: Mutex::new(VecDeque::new()),
            eval_cp: 0,
            fail: false,
            illegal: false,
            best_calls: AtomicUsize::new(0),
            eval_calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_moves(moves: &[&str]) -> Self {
        let e = Self::new();
        e.moves.lock().unwrap().extend(moves.iter().map(|m| m.to_string()));
        e
    }

    pub fn with_eval(mut self, cp: i32) -> Self {
        self.eval_cp = cp;
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    /// Always answers with a move that is not legal anywhere.
    pub fn proposing_illegal() -> Self {
        Self { illegal: true, ..Self::new() }
    }
}

#[async_trait]
impl SearchOracle for ScriptedEngine {
    async fn best_move(&self, position: &Position, _budget: Duration) -> Result<Move, OracleError> {
        self.best_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OracleError::Unavailable("scripted failure".into()));
        }
        if self.illegal {
            return Ok(Move { from: cozy_chess::Square::A1, to: cozy_chess::Square::A1, promotion: None });
        }
        let queued = self.moves.lock().unwrap().pop_front();
        match queued {
            Some(text) => Ok(position.parse_uci(&text)?),
            None => position.legal_moves().first().copied().ok_or(OracleError::NoMove),
        }
    }

    async fn evaluate(&self, _position: &Position) -> Result<Evaluation, OracleError> {
        self.eval_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OracleError::Unavailable("scripted failure".into()));
        }
        Ok(Evaluation::from_cp(self.eval_cp))
    }

    async fn shutdown(&self) -> Result<(), OracleError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Predictive oracle double with a fixed candidate and evaluation.
pub struct StubModel {
    pub ready: bool,
    pub candidate: Option<Move>,
    pub eval_cp: i32,
    pub fail: bool,
}

impl StubModel {
    pub fn proposing(uci: &str, eval_cp: i32) -> Self {
        Self { ready: true, candidate: Some(uci.parse().expect("move text")), eval_cp, fail: false }
    }

    pub fn not_ready() -> Self {
        Self { ready: false, candidate: None, eval_cp: 0, fail: false }
    }

    pub fn failing() -> Self {
        Self { ready: true, candidate: None, eval_cp: 0, fail: true }
    }
}

#[async_trait]
impl PredictiveOracle for StubModel {
    fn is_ready(&self) -> bool { self.ready }

    async fn predict_move(&self, _position: &Position) -> Result<Option<Move>, OracleError> {
        if self.fail {
            return Err(OracleError::Unavailable("model crashed".into()));
        }
        Ok(self.candidate)
    }

    async fn evaluate_move(&self, _position: &Position, _mv: Move) -> Result<Evaluation, OracleError> {
        Ok(Evaluation::from_cp(self.eval_cp))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WhenEmpty {
    Idle,
    Fail,
}

/// Platform double. Hands out queued assignments, then idles or fails; the
/// opponent's replies come from a queue (empty queue = no news).
pub struct ScriptedClient {
    assignments: Mutex<VecDeque<GameAssignment>>,
    replies: Mutex<VecDeque<String>>,
    when_empty: WhenEmpty,
    pub accept_moves: bool,
    pub submitted: Mutex<Vec<String>>,
    pub find_calls: AtomicUsize,
    pub resigned: AtomicBool,
    pub closed: AtomicBool,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl ScriptedClient {
    pub fn new(assignments: Vec<GameAssignment>, replies: &[&str], when_empty: WhenEmpty) -> Self {
        Self {
            assignments: Mutex::new(assignments.into()),
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            when_empty,
            accept_moves: true,
            submitted: Mutex::new(Vec::new()),
            find_calls: AtomicUsize::new(0),
            resigned: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cancel_on_call: None,
        }
    }

    /// Cancels `token` when `find_or_create_game` is called for the `n`th time.
    pub fn cancel_on_call(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((n, token));
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameClient for ScriptedClient {
    async fn find_or_create_game(&self) -> Result<Option<GameAssignment>, ClientError> {
        let n = self.find_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if n >= *at { token.cancel(); }
        }
        if let Some(a) = self.assignments.lock().unwrap().pop_front() {
            return Ok(Some(a));
        }
        match self.when_empty {
            WhenEmpty::Idle => Ok(None),
            WhenEmpty::Fail => Err(ClientError::Transport("connection refused".into())),
        }
    }

    async fn submit_move(&self, _game_id: &str, uci: &str) -> Result<bool, ClientError> {
        self.submitted.lock().unwrap().push(uci.to_string());
        Ok(self.accept_moves)
    }

    async fn await_opponent_move(&self, _game_id: &str, _timeout: Duration) -> Result<Option<String>, ClientError> {
        Ok(self.replies.lock().unwrap().pop_front())
    }

    async fn resign(&self, _game_id: &str) -> Result<(), ClientError> {
        self.resigned.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps every handed-off record.
#[derive(Default)]
pub struct RecordingPipeline {
    pub records: Mutex<Vec<GameRecord>>,
    pub shut_down: AtomicBool,
}

impl RecordingPipeline {
    pub fn records(&self) -> Vec<GameRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostGamePipeline for RecordingPipeline {
    async fn handle_finished_game(&self, record: GameRecord, tally: &mut BotRecord) {
        tally.record(record.result);
        self.records.lock().unwrap().push(record);
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
