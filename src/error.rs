use std::path::PathBuf;

/// Errors raised by position parsing and move application.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("unparseable move text '{0}'")]
    BadMoveText(String),

    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },
}

/// Faults of the search engine or the learned model.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned no move")]
    NoMove,

    #[error("oracle proposed an unusable move: {0}")]
    BadMove(#[from] BoardError),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("searcher lock poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the game platform client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unknown game {0}")]
    UnknownGame(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    #[error("no legal moves in position {0}")]
    NoLegalMoves(String),
}

/// Errors that end a session without a post-game hand-off.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("board error: {0}")]
    Board(#[from] BoardError),

    #[error("arbiter error: {0}")]
    Arbiter(#[from] ArbiterError),

    #[error("platform rejected move {uci} in game {game_id}")]
    MoveRejected { game_id: String, uci: String },

    #[error("opponent silent for {waits} consecutive waits in game {game_id}")]
    OpponentSilent { game_id: String, waits: u32 },
}

/// Errors of the game store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("game {0} already stored")]
    DuplicateGame(String),

    #[error("corrupt record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
