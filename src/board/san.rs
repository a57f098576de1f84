use cozy_chess::{Board, Move, Piece, Square};

use super::cozy::{is_capture, is_castle};

fn piece_letter(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "",
        Piece::Knight => "N",
        Piece::Bishop => "B",
        Piece::Rook => "R",
        Piece::Queen => "Q",
        Piece::King => "K",
    }
}

fn file_char(sq: Square) -> char { (b'a' + sq.file() as u8) as char }
fn rank_char(sq: Square) -> char { (b'1' + sq.rank() as u8) as char }

/// Standard algebraic notation of a legal `mv` in `board`.
pub fn san(board: &Board, mv: Move) -> String {
    let mut out = String::new();
    if is_castle(board, mv) {
        out.push_str(if (mv.to.file() as usize) > (mv.from.file() as usize) { "O-O" } else { "O-O-O" });
    } else {
        let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
        let capture = is_capture(board, mv);
        if piece == Piece::Pawn {
            if capture { out.push(file_char(mv.from)); }
        } else {
            out.push_str(piece_letter(piece));
            out.push_str(&disambiguation(board, mv, piece));
        }
        if capture { out.push('x'); }
        out.push_str(&format!("{}", mv.to));
        if let Some(promo) = mv.promotion {
            out.push('=');
            out.push_str(piece_letter(promo));
        }
    }
    let mut child = board.clone();
    child.play(mv);
    if !child.checkers().is_empty() {
        let escapes = child.generate_moves(|ml| !ml.is_empty());
        out.push(if escapes { '+' } else { '#' });
    }
    out
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|ml| {
        if ml.piece == piece {
            for m in ml {
                if m.to == mv.to && m.from != mv.from { rivals.push(m.from); }
            }
        }
        false
    });
    if rivals.is_empty() { return String::new(); }
    let same_file = rivals.iter().any(|sq| sq.file() == mv.from.file());
    let same_rank = rivals.iter().any(|sq| sq.rank() == mv.from.rank());
    if !same_file {
        file_char(mv.from).to_string()
    } else if !same_rank {
        rank_char(mv.from).to_string()
    } else {
        format!("{}", mv.from)
    }
}

/// SAN for a whole line starting at `initial`. Stops at the first illegal move.
pub fn san_line(initial: &Board, moves: &[Move]) -> Vec<String> {
    let mut b = initial.clone();
    let mut out = Vec::with_capacity(moves.len());
    for &mv in moves {
        if !b.is_legal(mv) { break; }
        out.push(san(&b, mv));
        b.play(mv);
    }
    out
}
