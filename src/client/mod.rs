//! The game platform boundary.

use async_trait::async_trait;
use cozy_chess::Color;
use std::time::Duration;

use crate::error::ClientError;

pub mod local;

pub use local::LocalArena;

/// A game handed to the bot by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameAssignment {
    pub id: String,
    pub opponent: String,
    /// The color the bot plays.
    pub color: Color,
    pub white_name: String,
    pub black_name: String,
    /// Set-up start position; standard start when absent.
    pub initial_fen: Option<String>,
}

#[async_trait]
pub trait GameClient: Send + Sync {
    /// `None` when no game is available right now.
    async fn find_or_create_game(&self) -> Result<Option<GameAssignment>, ClientError>;

    /// Submits a move in coordinate notation. `false` means the platform
    /// did not accept it.
    async fn submit_move(&self, game_id: &str, uci: &str) -> Result<bool, ClientError>;

    /// Waits up to `timeout` for the opponent's next move. `None` carries no
    /// information; the caller simply asks again.
    async fn await_opponent_move(
        &self,
        game_id: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ClientError>;

    async fn resign(&self, game_id: &str) -> Result<(), ClientError>;

    async fn close(&self) -> Result<(), ClientError> { Ok(()) }
}
