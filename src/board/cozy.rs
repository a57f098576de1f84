use cozy_chess::{Board as CozyBoard, Color, File, Move, Piece, Square};
use std::fmt;

use crate::error::BoardError;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Why a game ended on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// `mated` is the side to move that has no escape.
    Checkmate { mated: Color },
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoves,
    FivefoldRepetition,
}

impl Termination {
    pub fn is_draw(&self) -> bool {
        !matches!(self, Termination::Checkmate { .. })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Checkmate { mated } => write!(f, "checkmate ({} mated)", color_name(*mated)),
            Termination::Stalemate => f.write_str("stalemate"),
            Termination::InsufficientMaterial => f.write_str("insufficient material"),
            Termination::SeventyFiveMoves => f.write_str("seventy-five-move rule"),
            Termination::FivefoldRepetition => f.write_str("fivefold repetition"),
        }
    }
}

pub fn color_name(c: Color) -> &'static str {
    if c == Color::White { "white" } else { "black" }
}

/// A game position plus the bookkeeping cozy-chess leaves to the caller:
/// played moves, repetition history and an unclamped half-move counter.
#[derive(Clone, Debug)]
pub struct Position {
    board: CozyBoard,
    initial: CozyBoard,
    initial_halfmoves: u32,
    played: Vec<Move>,
    // Hashes since the last irreversible move, current position last.
    history: Vec<u64>,
    halfmoves: u32,
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_board(CozyBoard::default(), 0)
    }

    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(BoardError::InvalidFen { fen: fen.to_string(), reason: "expected 6 fields".into() });
        }
        let halfmoves: u32 = fields[4].parse().map_err(|_| BoardError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("bad half-move clock '{}'", fields[4]),
        })?;
        // cozy-chess caps its own clock; ours is tracked separately
        let normalized = format!("{} {} {} {} 0 {}", fields[0], fields[1], fields[2], fields[3], fields[5]);
        let board = CozyBoard::from_fen(&normalized, false)
            .map_err(|e| BoardError::InvalidFen { fen: fen.to_string(), reason: format!("{e:?}") })?;
        Ok(Self::from_board(board, halfmoves))
    }

    fn from_board(board: CozyBoard, halfmoves: u32) -> Self {
        Self {
            history: vec![board.hash()],
            initial: board.clone(),
            initial_halfmoves: halfmoves,
            board,
            played: Vec::new(),
            halfmoves,
        }
    }

    pub fn board(&self) -> &CozyBoard { &self.board }
    pub fn initial_board(&self) -> &CozyBoard { &self.initial }
    pub fn side_to_move(&self) -> Color { self.board.side_to_move() }
    pub fn played(&self) -> &[Move] { &self.played }
    pub fn halfmove_clock(&self) -> u32 { self.halfmoves }

    pub fn fen(&self) -> String { with_halfmoves(&self.board, self.halfmoves) }
    pub fn initial_fen(&self) -> String { with_halfmoves(&self.initial, self.initial_halfmoves) }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut out = Vec::with_capacity(48);
        self.board.generate_moves(|ml| { out.extend(ml); false });
        out
    }

    pub fn has_legal_moves(&self) -> bool {
        self.board.generate_moves(|ml| !ml.is_empty())
    }

    pub fn is_legal(&self, mv: Move) -> bool { self.board.is_legal(mv) }

    pub fn play(&mut self, mv: Move) -> Result<(), BoardError> {
        if !self.board.is_legal(mv) {
            return Err(BoardError::IllegalMove { mv: format!("{mv}"), fen: self.fen() });
        }
        let irreversible = is_capture(&self.board, mv) || self.board.piece_on(mv.from) == Some(Piece::Pawn);
        self.board.play(mv);
        self.played.push(mv);
        if irreversible {
            self.halfmoves = 0;
            self.history.clear();
        } else {
            self.halfmoves += 1;
        }
        self.history.push(self.board.hash());
        Ok(())
    }

    /// Copy of the position with `mv` applied.
    pub fn after(&self, mv: Move) -> Result<Position, BoardError> {
        let mut next = self.clone();
        next.play(mv)?;
        Ok(next)
    }

    pub fn to_uci(&self, mv: Move) -> String { move_to_uci(&self.board, mv) }

    pub fn parse_uci(&self, text: &str) -> Result<Move, BoardError> {
        let mv = uci_to_move(&self.board, text)?;
        if !self.board.is_legal(mv) {
            return Err(BoardError::IllegalMove { mv: text.to_string(), fen: self.fen() });
        }
        Ok(mv)
    }

    pub fn play_uci(&mut self, text: &str) -> Result<Move, BoardError> {
        let mv = self.parse_uci(text)?;
        self.play(mv)?;
        Ok(mv)
    }

    /// Played moves in coordinate notation.
    pub fn uci_history(&self) -> Vec<String> {
        let mut b = self.initial.clone();
        self.played.iter().map(|&mv| {
            let s = move_to_uci(&b, mv);
            b.play(mv);
            s
        }).collect()
    }

    pub fn repetitions(&self) -> usize {
        let cur = self.board.hash();
        self.history.iter().filter(|&&h| h == cur).count()
    }

    pub fn termination(&self) -> Option<Termination> {
        if !self.has_legal_moves() {
            if self.board.checkers().is_empty() { return Some(Termination::Stalemate); }
            return Some(Termination::Checkmate { mated: self.side_to_move() });
        }
        if self.is_insufficient_material() { return Some(Termination::InsufficientMaterial); }
        if self.halfmoves >= 150 { return Some(Termination::SeventyFiveMoves); }
        if self.repetitions() >= 5 { return Some(Termination::FivefoldRepetition); }
        None
    }

    pub fn is_insufficient_material(&self) -> bool {
        side_cannot_mate(&self.board, Color::White) && side_cannot_mate(&self.board, Color::Black)
    }
}

fn with_halfmoves(board: &CozyBoard, halfmoves: u32) -> String {
    let s = format!("{board}");
    let mut fields: Vec<String> = s.split_whitespace().map(str::to_string).collect();
    if fields.len() == 6 { fields[4] = halfmoves.to_string(); }
    fields.join(" ")
}

fn count(board: &CozyBoard, color: Color, piece: Piece) -> usize {
    (board.colors(color) & board.pieces(piece)).into_iter().count()
}

fn is_light(sq: Square) -> bool {
    (sq.file() as usize + sq.rank() as usize) % 2 == 1
}

// Mirrors the usual "dead position" shortcuts: lone king, one minor against a
// bare king, or bishops that all live on one square color.
fn side_cannot_mate(board: &CozyBoard, color: Color) -> bool {
    let them = !color;
    if count(board, color, Piece::Pawn) + count(board, color, Piece::Rook) + count(board, color, Piece::Queen) > 0 {
        return false;
    }
    let knights = count(board, color, Piece::Knight);
    let bishops = board.colors(color) & board.pieces(Piece::Bishop);
    if knights > 0 {
        let ours = board.colors(color).into_iter().count();
        let theirs_minor_or_rook = count(board, them, Piece::Pawn) + count(board, them, Piece::Knight)
            + count(board, them, Piece::Bishop) + count(board, them, Piece::Rook);
        return ours <= 2 && theirs_minor_or_rook == 0;
    }
    if !bishops.is_empty() {
        // any bishop of either side counts: opposite-colored bishops can still mate
        let all = board.pieces(Piece::Bishop);
        let light = all.into_iter().filter(|&sq| is_light(sq)).count();
        let same_color = light == 0 || light == all.into_iter().count();
        return same_color && count(board, them, Piece::Pawn) == 0 && count(board, them, Piece::Knight) == 0;
    }
    true
}

pub fn is_castle(board: &CozyBoard, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King) && board.color_on(mv.to) == Some(board.side_to_move())
}

pub fn is_capture(board: &CozyBoard, mv: Move) -> bool {
    if is_castle(board, mv) { return false; }
    if board.color_on(mv.to) == Some(!board.side_to_move()) { return true; }
    // en passant: pawn changes file onto an empty square
    board.piece_on(mv.from) == Some(Piece::Pawn) && mv.from.file() != mv.to.file()
}

/// cozy-chess encodes castling as king-takes-rook; the wire uses e1g1 style.
pub fn move_to_uci(board: &CozyBoard, mv: Move) -> String {
    if is_castle(board, mv) {
        let file = if mv.to.file() as usize > mv.from.file() as usize { File::G } else { File::C };
        let to = Square::new(file, mv.from.rank());
        return format!("{}{}", mv.from, to);
    }
    format!("{mv}")
}

pub fn uci_to_move(board: &CozyBoard, text: &str) -> Result<Move, BoardError> {
    let mut mv: Move = text.trim().parse().map_err(|_| BoardError::BadMoveText(text.to_string()))?;
    if board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.from) == Some(board.side_to_move())
        && mv.from.file() == File::E
        && mv.from.rank() == mv.to.rank()
    {
        let rook_file = match mv.to.file() {
            File::G => Some(File::H),
            File::C => Some(File::A),
            _ => None,
        };
        if let Some(rf) = rook_file {
            let rook_sq = Square::new(rf, mv.from.rank());
            if board.piece_on(rook_sq) == Some(Piece::Rook) && board.color_on(rook_sq) == Some(board.side_to_move()) {
                mv.to = rook_sq;
            }
        }
    }
    Ok(mv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn castling_round_trips_through_standard_notation() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = pos.parse_uci("e1g1").expect("short castle is legal");
        assert_eq!(mv.to, Square::H1);
        assert_eq!(pos.to_uci(mv), "e1g1");
        pos.play(mv).unwrap();
        let long = pos.parse_uci("e8c8").expect("long castle is legal");
        assert_eq!(pos.to_uci(long), "e8c8");
        pos.play(long).unwrap();
        assert_eq!(pos.uci_history(), vec!["e1g1".to_string(), "e8c8".to_string()]);
    }

    #[test]
    fn king_step_is_not_mistaken_for_castling() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let mv = pos.parse_uci("e1f1").unwrap();
        assert_eq!(mv.to, Square::F1);
        assert_eq!(pos.to_uci(mv), "e1f1");
    }

    #[test]
    fn half_move_clock_survives_above_cozy_cap() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 140 90").unwrap();
        assert_eq!(pos.halfmove_clock(), 140);
        assert!(pos.fen().contains(" 140 90"));
    }

    #[test]
    fn captures_reset_repetition_history() {
        let mut pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 3 10").unwrap();
        pos.play_uci("e4d5").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.repetitions(), 1);
    }

    #[test]
    fn rejects_garbage_and_illegal_text() {
        let pos = Position::startpos();
        assert!(matches!(pos.parse_uci("zz"), Err(BoardError::BadMoveText(_))));
        assert!(matches!(pos.parse_uci("e2e5"), Err(BoardError::IllegalMove { .. })));
    }
}
