//! The outer loop: ask for games, play them, wait when there is nothing to do.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::GameClient;
use crate::config::MatchmakingConfig;
use crate::oracle::SearchOracle;
use crate::pipeline::{BotRecord, PostGamePipeline};
use crate::session::SessionController;

pub struct Matchmaker {
    client: Arc<dyn GameClient>,
    sessions: SessionController,
    engine: Arc<dyn SearchOracle>,
    pipeline: Arc<dyn PostGamePipeline>,
    config: MatchmakingConfig,
}

/// Sleeps for `d` unless cancelled first. Returns whether it was cancelled.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(d) => false,
    }
}

impl Matchmaker {
    pub fn new(
        client: Arc<dyn GameClient>,
        sessions: SessionController,
        engine: Arc<dyn SearchOracle>,
        pipeline: Arc<dyn PostGamePipeline>,
        config: MatchmakingConfig,
    ) -> Self {
        Self { client, sessions, engine, pipeline, config }
    }

    /// Runs until `cancel` fires (or `max_games` sessions have been played),
    /// then releases the engine, the pipeline and the client. A session in
    /// flight is finished before the loop notices cancellation.
    pub async fn run(&self, tally: &mut BotRecord, cancel: CancellationToken) -> u64 {
        let mut sessions = 0u64;
        loop {
            if cancel.is_cancelled() { break; }
            if self.config.max_games.is_some_and(|m| sessions >= m) {
                info!("played {sessions} game(s), stopping");
                break;
            }
            let wait = match self.client.find_or_create_game().await {
                Ok(Some(assignment)) => {
                    sessions += 1;
                    match self.sessions.play(assignment, tally).await {
                        Ok(_) => None,
                        Err(e) => {
                            warn!("session failed: {e}; backing off {:?}", self.config.backoff());
                            Some(self.config.backoff())
                        }
                    }
                }
                Ok(None) => {
                    debug!("no game available, idling {:?}", self.config.idle());
                    Some(self.config.idle())
                }
                Err(e) => {
                    warn!("finding a game failed: {e}; backing off {:?}", self.config.backoff());
                    Some(self.config.backoff())
                }
            };
            if let Some(d) = wait {
                if pause(d, &cancel).await { break; }
            }
        }
        self.shutdown().await;
        sessions
    }

    async fn shutdown(&self) {
        info!("matchmaking stopped, shutting down");
        if let Err(e) = self.engine.shutdown().await {
            warn!("engine shutdown failed: {e}");
        }
        self.pipeline.shutdown().await;
        if let Err(e) = self.client.close().await {
            warn!("client close failed: {e}");
        }
    }
}
