// Live chess bot: model/engine move arbitration, game sessions and matchmaking
pub mod arbiter;
pub mod board;
pub mod client;
pub mod config;
pub mod error;
pub mod eval;
pub mod matchmaking;
pub mod oracle;
pub mod pipeline;
pub mod record;
pub mod search;
pub mod session;

pub use arbiter::{Arbiter, MoveChoice};
pub use board::Position;
pub use config::BotConfig;
pub use record::{GameRecord, GameResult};
