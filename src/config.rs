use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level bot configuration, loadable from TOML. Every section and field
/// has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub arbiter: ArbiterConfig,
    pub session: SessionConfig,
    pub matchmaking: MatchmakingConfig,
    pub search: SearchConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub arena: ArenaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// How much worse than the engine line (centipawns, mover's view) a model
    /// move may be and still be played.
    pub tolerance_cp: i32,
    /// Budget for the engine reference move during model verification.
    pub short_budget_ms: u64,
    /// Budget for the engine fallback move.
    pub long_budget_ms: u64,
    /// Seed for the random fallback; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self { tolerance_cp: 100, short_budget_ms: 500, long_budget_ms: 1000, seed: None }
    }
}

impl ArbiterConfig {
    pub fn short_budget(&self) -> Duration { Duration::from_millis(self.short_budget_ms) }
    pub fn long_budget(&self) -> Duration { Duration::from_millis(self.long_budget_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bot_name: String,
    pub event: String,
    pub site: String,
    /// One `await_opponent_move` call waits at most this long.
    pub opponent_wait_ms: u64,
    /// Consecutive empty waits before the bot resigns.
    pub max_silent_waits: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bot_name: "PieBot".into(),
            event: "Live game".into(),
            site: "local arena".into(),
            opponent_wait_ms: 5_000,
            max_silent_waits: 60,
        }
    }
}

impl SessionConfig {
    pub fn opponent_wait(&self) -> Duration { Duration::from_millis(self.opponent_wait_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub idle_ms: u64,
    pub backoff_ms: u64,
    /// Stop after this many sessions.
    pub max_games: Option<u64>,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self { idle_ms: 10_000, backoff_ms: 30_000, max_games: None }
    }
}

impl MatchmakingConfig {
    pub fn idle(&self) -> Duration { Duration::from_millis(self.idle_ms) }
    pub fn backoff(&self) -> Duration { Duration::from_millis(self.backoff_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Depth of post-move evaluations with the builtin searcher.
    pub eval_depth: u32,
    pub max_depth: u32,
    pub threads: usize,
    pub hash_mb: usize,
    /// External UCI engine; the builtin searcher is used when absent.
    pub uci_engine: Option<PathBuf>,
    pub uci_eval_depth: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { eval_depth: 5, max_depth: 64, threads: 1, hash_mb: 16, uci_engine: None, uci_eval_depth: 12 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `PIENNUE1` value-net weights. No path means no model.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub retrain_every: u64,
    /// Games exported per retraining round.
    pub export_games: usize,
    pub records_per_shard: usize,
    /// Evaluation drops, in pawns, counted by the analyzer.
    pub mistake_pawns: f64,
    pub blunder_pawns: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retrain_every: 10,
            export_games: 100,
            records_per_shard: 100_000,
            mistake_pawns: 2.0,
            blunder_pawns: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub opponent_name: String,
    pub opponent_depth: u32,
    pub opponent_movetime_ms: u64,
    /// Start position for arena games; standard start when absent.
    pub initial_fen: Option<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            opponent_name: "sparring".into(),
            opponent_depth: 3,
            opponent_movetime_ms: 200,
            initial_fen: None,
        }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: BotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arbiter.tolerance_cp < 0 {
            return Err(ConfigError::Validation("arbiter.tolerance_cp must be >= 0".into()));
        }
        if self.arbiter.short_budget_ms == 0 || self.arbiter.long_budget_ms == 0 {
            return Err(ConfigError::Validation("arbiter budgets must be > 0".into()));
        }
        if self.session.opponent_wait_ms == 0 {
            return Err(ConfigError::Validation("session.opponent_wait_ms must be > 0".into()));
        }
        if self.session.max_silent_waits == 0 {
            return Err(ConfigError::Validation("session.max_silent_waits must be >= 1".into()));
        }
        if self.search.eval_depth == 0 || self.search.max_depth == 0 {
            return Err(ConfigError::Validation("search depths must be >= 1".into()));
        }
        if self.search.threads == 0 {
            return Err(ConfigError::Validation("search.threads must be >= 1".into()));
        }
        if self.pipeline.retrain_every == 0 {
            return Err(ConfigError::Validation("pipeline.retrain_every must be >= 1".into()));
        }
        if self.pipeline.records_per_shard == 0 {
            return Err(ConfigError::Validation("pipeline.records_per_shard must be >= 1".into()));
        }
        if !(self.pipeline.mistake_pawns > 0.0 && self.pipeline.blunder_pawns >= self.pipeline.mistake_pawns) {
            return Err(ConfigError::Validation(
                "pipeline thresholds need 0 < mistake_pawns <= blunder_pawns".into(),
            ));
        }
        if self.arena.opponent_depth == 0 {
            return Err(ConfigError::Validation("arena.opponent_depth must be >= 1".into()));
        }
        Ok(())
    }
}
