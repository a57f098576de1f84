use cozy_chess::{Board, Color, Piece, Square};

pub const PAWN: i32 = 100;
pub const KNIGHT: i32 = 320;
pub const BISHOP: i32 = 330;
pub const ROOK: i32 = 500;
pub const QUEEN: i32 = 900;

// Mate scoring helpers
pub const MATE_SCORE: i32 = 30_000;
pub const MATE_BOUND: i32 = MATE_SCORE - 1_000;
pub const DRAW_SCORE: i32 = 0;

pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN,
        Piece::Knight => KNIGHT,
        Piece::Bishop => BISHOP,
        Piece::Rook => ROOK,
        Piece::Queen => QUEEN,
        Piece::King => 20_000,
    }
}

const MATERIAL: [Piece; 5] = [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

fn count_piece(board: &Board, color: Color, piece: Piece) -> i32 {
    (board.colors(color) & board.pieces(piece)).into_iter().count() as i32
}

// Side-agnostic material in centipawns: positive means White has more material.
pub fn material_eval_cp_side_agnostic(board: &Board) -> i32 {
    MATERIAL.iter()
        .map(|&p| (count_piece(board, Color::White, p) - count_piece(board, Color::Black, p)) * piece_value(p))
        .sum()
}

// Material from side-to-move perspective (negamax-friendly)
pub fn material_eval_cp(board: &Board) -> i32 {
    let base = material_eval_cp_side_agnostic(board);
    if board.side_to_move() == Color::White { base } else { -base }
}

// Distance-from-center bonus for minor pieces, advancement for pawns.
fn placement_bonus(piece: Piece, color: Color, sq: Square) -> i32 {
    let file = sq.file() as i32;
    let rank = sq.rank() as i32;
    let rel_rank = if color == Color::White { rank } else { 7 - rank };
    let center = 6 - ((2 * file - 7).abs() + (2 * rank - 7).abs()) / 2;
    match piece {
        Piece::Knight => center * 5,
        Piece::Bishop => center * 3,
        Piece::Pawn => rel_rank * 4 + if (3..=4).contains(&file) { rel_rank * 2 } else { 0 },
        _ => 0,
    }
}

/// Static evaluation in centipawns, White-positive.
pub fn eval_white_cp(board: &Board) -> i32 {
    let mut score = material_eval_cp_side_agnostic(board);
    for &color in &[Color::White, Color::Black] {
        let sign = if color == Color::White { 1 } else { -1 };
        for &piece in &[Piece::Pawn, Piece::Knight, Piece::Bishop] {
            for sq in board.colors(color) & board.pieces(piece) {
                score += sign * placement_bonus(piece, color, sq);
            }
        }
    }
    score
}

/// Static evaluation from the side to move.
pub fn eval_cp(board: &Board) -> i32 {
    let s = eval_white_cp(board);
    if board.side_to_move() == Color::White { s } else { -s }
}
