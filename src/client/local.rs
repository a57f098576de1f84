use async_trait::async_trait;
use cozy_chess::Color;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::board::{color_name, Position, START_FEN};
use crate::client::{GameAssignment, GameClient};
use crate::config::{ArenaConfig, SessionConfig};
use crate::error::{BoardError, ClientError};
use crate::oracle::SearchOracle;

struct ArenaGame {
    position: Position,
    bot_color: Color,
}

/// In-process sparring platform. Every request for a game opens a fresh one
/// with alternating colors; the opponent's moves come from a search oracle.
/// A game is forgotten once it ends: after the move that finishes it has
/// been submitted or handed out, or when the bot resigns.
pub struct LocalArena {
    games: Mutex<HashMap<String, ArenaGame>>,
    opponent: Arc<dyn SearchOracle>,
    opponent_name: String,
    bot_name: String,
    movetime: Duration,
    start: Position,
    created: AtomicU64,
}

impl LocalArena {
    pub fn new(
        opponent: Arc<dyn SearchOracle>,
        arena: &ArenaConfig,
        session: &SessionConfig,
    ) -> Result<Self, BoardError> {
        let start = match &arena.initial_fen {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::startpos(),
        };
        Ok(Self {
            games: Mutex::new(HashMap::new()),
            opponent,
            opponent_name: arena.opponent_name.clone(),
            bot_name: session.bot_name.clone(),
            movetime: Duration::from_millis(arena.opponent_movetime_ms),
            start,
            created: AtomicU64::new(0),
        })
    }

    /// Current position of a game, as the arena sees it.
    pub async fn position(&self, game_id: &str) -> Option<Position> {
        self.games.lock().await.get(game_id).map(|g| g.position.clone())
    }

    /// Games still in play.
    pub async fn active_games(&self) -> usize {
        self.games.lock().await.len()
    }

    async fn reply(&self, game_id: &str) -> Result<Option<String>, ClientError> {
        let position = {
            let games = self.games.lock().await;
            let game = games.get(game_id).ok_or_else(|| ClientError::UnknownGame(game_id.to_string()))?;
            if game.position.side_to_move() == game.bot_color || !game.position.has_legal_moves() {
                return Ok(None);
            }
            game.position.clone()
        };
        let mv = self
            .opponent
            .best_move(&position, self.movetime)
            .await
            .map_err(|e| ClientError::Transport(format!("opponent engine: {e}")))?;
        let uci = position.to_uci(mv);

        let mut games = self.games.lock().await;
        // A resignation or another reply may have landed meanwhile.
        let Some(game) = games.get_mut(game_id) else { return Ok(None) };
        if game.position.played().len() != position.played().len() {
            return Ok(None);
        }
        game.position
            .play(mv)
            .map_err(|e| ClientError::Transport(format!("opponent engine: {e}")))?;
        debug!("arena {game_id}: opponent plays {uci}");
        if game.position.termination().is_some() {
            games.remove(game_id);
            debug!("arena {game_id}: over after the opponent's move");
        }
        Ok(Some(uci))
    }
}

#[async_trait]
impl GameClient for LocalArena {
    async fn find_or_create_game(&self) -> Result<Option<GameAssignment>, ClientError> {
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        let color = if n % 2 == 0 { Color::White } else { Color::Black };
        let id = uuid::Uuid::new_v4().to_string();
        let (white_name, black_name) = if color == Color::White {
            (self.bot_name.clone(), self.opponent_name.clone())
        } else {
            (self.opponent_name.clone(), self.bot_name.clone())
        };
        self.games.lock().await.insert(
            id.clone(),
            ArenaGame { position: self.start.clone(), bot_color: color },
        );
        info!("arena: new game {id}, bot plays {}", color_name(color));
        Ok(Some(GameAssignment {
            id,
            opponent: self.opponent_name.clone(),
            color,
            white_name,
            black_name,
            initial_fen: (self.start.initial_fen() != START_FEN).then(|| self.start.initial_fen()),
        }))
    }

    async fn submit_move(&self, game_id: &str, uci: &str) -> Result<bool, ClientError> {
        let mut games = self.games.lock().await;
        let game = games.get_mut(game_id).ok_or_else(|| ClientError::UnknownGame(game_id.to_string()))?;
        if game.position.side_to_move() != game.bot_color || game.position.play_uci(uci).is_err() {
            return Ok(false);
        }
        if game.position.termination().is_some() {
            games.remove(game_id);
            debug!("arena {game_id}: over after the bot's move");
        }
        Ok(true)
    }

    async fn await_opponent_move(
        &self,
        game_id: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ClientError> {
        match tokio::time::timeout(timeout, self.reply(game_id)).await {
            Ok(reply) => reply,
            Err(_) => Ok(None),
        }
    }

    async fn resign(&self, game_id: &str) -> Result<(), ClientError> {
        self.games
            .lock()
            .await
            .remove(game_id)
            .ok_or_else(|| ClientError::UnknownGame(game_id.to_string()))?;
        info!("arena {game_id}: bot resigned");
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.games.lock().await.clear();
        Ok(())
    }
}
