//! Finished-game records and their PGN rendering.

use chrono::{DateTime, Utc};
use cozy_chess::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::san::san_line;
use crate::board::{Position, Termination, START_FEN};

/// Outcome from the bot's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
    Unknown,
}

impl GameResult {
    pub fn from_termination(termination: Termination, bot: Color) -> Self {
        match termination {
            Termination::Checkmate { mated } if mated == bot => GameResult::Loss,
            Termination::Checkmate { .. } => GameResult::Win,
            _ => GameResult::Draw,
        }
    }

    /// PGN result token for a bot playing `bot`.
    pub fn pgn_token(self, bot: Color) -> &'static str {
        match (self, bot) {
            (GameResult::Win, Color::White) | (GameResult::Loss, Color::Black) => "1-0",
            (GameResult::Win, Color::Black) | (GameResult::Loss, Color::White) => "0-1",
            (GameResult::Draw, _) => "1/2-1/2",
            (GameResult::Unknown, _) => "*",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameResult::Win => "win",
            GameResult::Loss => "loss",
            GameResult::Draw => "draw",
            GameResult::Unknown => "unknown",
        })
    }
}

/// One finished game, as persisted (one JSON object per line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub opponent: String,
    /// "white" or "black": the bot's color.
    pub color: String,
    pub result: GameResult,
    pub moves: Vec<String>,
    /// Seconds spent choosing each of the bot's moves.
    pub move_times: Vec<f64>,
    /// Pawn units, positive favors White, one per recorded half-move.
    pub evaluations: Vec<f64>,
    pub pgn: String,
    /// Seconds from session start to termination.
    pub duration: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub termination: Option<String>,
    #[serde(default)]
    pub initial_fen: Option<String>,
}

impl GameRecord {
    pub fn bot_color(&self) -> Option<Color> {
        match self.color.as_str() {
            "white" => Some(Color::White),
            "black" => Some(Color::Black),
            _ => None,
        }
    }

    /// Replays the recorded moves from the start position. Stops at the first
    /// move that does not apply.
    pub fn replay(&self) -> Vec<Position> {
        let start = match &self.initial_fen {
            Some(fen) => Position::from_fen(fen),
            None => Ok(Position::startpos()),
        };
        let Ok(mut pos) = start else { return Vec::new() };
        let mut out = vec![pos.clone()];
        for uci in &self.moves {
            if pos.play_uci(uci).is_err() { break; }
            out.push(pos.clone());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct PgnHeaders<'a> {
    pub event: &'a str,
    pub site: &'a str,
    pub date: DateTime<Utc>,
    pub round: &'a str,
    pub white: &'a str,
    pub black: &'a str,
    pub result: &'a str,
}

/// PGN text for the moves played in `position`.
pub fn render_pgn(headers: &PgnHeaders<'_>, position: &Position) -> String {
    let mut out = String::new();
    let tags = [
        ("Event", headers.event.to_string()),
        ("Site", headers.site.to_string()),
        ("Date", headers.date.format("%Y.%m.%d").to_string()),
        ("Round", headers.round.to_string()),
        ("White", headers.white.to_string()),
        ("Black", headers.black.to_string()),
        ("Result", headers.result.to_string()),
    ];
    for (k, v) in tags {
        out.push_str(&format!("[{k} \"{}\"]\n", v.replace('"', "'")));
    }
    let initial_fen = position.initial_fen();
    if initial_fen != START_FEN {
        out.push_str("[SetUp \"1\"]\n");
        out.push_str(&format!("[FEN \"{initial_fen}\"]\n"));
    }
    out.push('\n');

    let mut number: u32 = initial_fen.split_whitespace().nth(5).and_then(|n| n.parse().ok()).unwrap_or(1);
    let mut white_to_move = position.initial_board().side_to_move() == Color::White;
    let mut tokens = Vec::new();
    for (i, san) in san_line(position.initial_board(), position.played()).into_iter().enumerate() {
        if white_to_move {
            tokens.push(format!("{number}."));
        } else if i == 0 {
            tokens.push(format!("{number}..."));
        }
        tokens.push(san);
        if !white_to_move { number += 1; }
        white_to_move = !white_to_move;
    }
    tokens.push(headers.result.to_string());

    let mut line_len = 0;
    for t in tokens {
        if line_len > 0 && line_len + 1 + t.len() > 79 {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += t.len();
        out.push_str(&t);
    }
    out.push('\n');
    out
}
