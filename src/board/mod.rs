pub mod cozy;
pub mod san;

pub use cozy::{color_name, move_to_uci, uci_to_move, Position, Termination, START_FEN};
