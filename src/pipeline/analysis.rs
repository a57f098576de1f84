use cozy_chess::Color;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::record::GameRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysis {
    /// Own moves after which the bot stood worse than the mistake threshold.
    /// Blunders are counted here too.
    pub mistakes: u32,
    pub blunders: u32,
    pub own_moves: u32,
    pub mean_move_time: f64,
}

/// Reads the evaluation trace of a finished game from the bot's side.
#[derive(Debug, Clone, Copy)]
pub struct GameAnalyzer {
    pub mistake_pawns: f64,
    pub blunder_pawns: f64,
}

impl Default for GameAnalyzer {
    fn default() -> Self {
        Self { mistake_pawns: 2.0, blunder_pawns: 5.0 }
    }
}

impl GameAnalyzer {
    pub fn new(mistake_pawns: f64, blunder_pawns: f64) -> Self {
        Self { mistake_pawns, blunder_pawns }
    }

    pub fn analyze(&self, record: &GameRecord) -> GameAnalysis {
        let mut out = GameAnalysis::default();
        let Some(bot) = record.bot_color() else { return out };
        let first_mover = first_mover(record.initial_fen.as_deref());
        let sign = if bot == Color::White { 1.0 } else { -1.0 };
        for (ply, eval) in record.evaluations.iter().enumerate() {
            let mover = if ply % 2 == 0 { first_mover } else { !first_mover };
            if mover != bot { continue; }
            out.own_moves += 1;
            let ours = eval * sign;
            if ours < -self.mistake_pawns {
                out.mistakes += 1;
                if ours < -self.blunder_pawns { out.blunders += 1; }
            }
        }
        if !record.move_times.is_empty() {
            out.mean_move_time = record.move_times.iter().sum::<f64>() / record.move_times.len() as f64;
        }
        debug!("game {}: {out:?}", record.game_id);
        out
    }
}

fn first_mover(initial_fen: Option<&str>) -> Color {
    match initial_fen.and_then(|f| f.split_whitespace().nth(1)) {
        Some("b") => Color::Black,
        _ => Color::White,
    }
}
