use cozy_chess::{Board, Move};

use crate::board::cozy::is_capture;
use crate::search::eval::piece_value;

fn least_valuable_recapture(board: &Board, target: cozy_chess::Square) -> Option<(Move, i32)> {
    let mut best: Option<(Move, i32)> = None;
    board.generate_moves(|ml| {
        let v = piece_value(ml.piece);
        if best.map_or(true, |(_, bv)| v < bv) {
            for m in ml {
                if m.to == target {
                    best = Some((m, v));
                    break;
                }
            }
        }
        false
    });
    best
}

/// Static exchange evaluation of a capture, in centipawns for the side to move.
/// `None` when `mv` is not a capture.
pub fn see_gain_cp(board: &Board, mv: Move) -> Option<i32> {
    if !is_capture(board, mv) { return None; }
    let target = mv.to;
    let first_victim = board.piece_on(target).map(piece_value).unwrap_or(piece_value(cozy_chess::Piece::Pawn));
    let mut on_square = board.piece_on(mv.from).map(piece_value)?;
    let mut gains = vec![first_victim];

    let mut cur = board.clone();
    cur.play(mv);
    while let Some((reply, attacker)) = least_valuable_recapture(&cur, target) {
        let prev = *gains.last().unwrap_or(&0);
        gains.push(on_square - prev);
        on_square = attacker;
        cur.play(reply);
    }
    // negamax fold from the end of the swap list
    for i in (0..gains.len().saturating_sub(1)).rev() {
        gains[i] = -((-gains[i]).max(gains[i + 1]));
    }
    Some(gains[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::Square;

    fn find(board: &Board, from: Square, to: Square) -> Move {
        let mut found = None;
        board.generate_moves(|ml| {
            for m in ml { if m.from == from && m.to == to { found = Some(m); } }
            found.is_some()
        });
        found.expect("move must be legal")
    }

    #[test]
    fn see_detects_bad_exchange_rook_x_pawn_on_h7() {
        let board = Board::from_fen("6k1/2R4p/6p1/8/6K1/6P1/8/8 w - - 3 38", false).unwrap();
        let see = see_gain_cp(&board, find(&board, Square::C7, Square::H7)).unwrap();
        assert!(see < 0, "losing exchange should be negative, got {see}");
    }

    #[test]
    fn free_queen_is_worth_a_queen() {
        let board = Board::from_fen("k7/8/8/8/8/8/3qQ3/7K w - - 0 1", false).unwrap();
        assert_eq!(see_gain_cp(&board, find(&board, Square::E2, Square::D2)), Some(900));
    }

    #[test]
    fn quiet_move_has_no_see() {
        let board = Board::default();
        assert_eq!(see_gain_cp(&board, find(&board, Square::E2, Square::E4)), None);
    }
}
