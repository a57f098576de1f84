use cozy_chess::Color;
use piebot_live::board::{Position, Termination};

#[test]
fn fivefold_repetition_by_knight_shuffle() {
    let mut pos = Position::startpos();
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for round in 0..4 {
        assert_eq!(pos.termination(), None, "ended early in round {round}");
        for m in shuffle { pos.play_uci(m).unwrap(); }
    }
    assert_eq!(pos.repetitions(), 5);
    assert_eq!(pos.termination(), Some(Termination::FivefoldRepetition));
}

#[test]
fn threefold_is_not_terminal() {
    let mut pos = Position::startpos();
    for _ in 0..2 {
        for m in ["b1c3", "b8c6", "c3b1", "c6b8"] { pos.play_uci(m).unwrap(); }
    }
    assert_eq!(pos.repetitions(), 3);
    assert_eq!(pos.termination(), None);
}

#[test]
fn seventy_five_move_rule_on_the_150th_quiet_half_move() {
    let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 149 120").unwrap();
    assert_eq!(pos.termination(), None);
    pos.play_uci("a1a2").unwrap();
    assert_eq!(pos.halfmove_clock(), 150);
    assert_eq!(pos.termination(), Some(Termination::SeventyFiveMoves));
}

#[test]
fn pawn_move_at_the_limit_resets_the_count() {
    let mut pos = Position::from_fen("4k3/8/8/8/8/8/P7/4K3 w - - 149 120").unwrap();
    pos.play_uci("a2a3").unwrap();
    assert_eq!(pos.halfmove_clock(), 0);
    assert_eq!(pos.termination(), None);
}

#[test]
fn mate_on_the_last_half_move_is_still_mate() {
    let mut pos = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 149 100").unwrap();
    pos.play_uci("a1a8").unwrap();
    assert_eq!(pos.termination(), Some(Termination::Checkmate { mated: Color::Black }));
}

#[test]
fn stalemate_and_checkmate() {
    let stale = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
    assert_eq!(stale.termination(), Some(Termination::Stalemate));
    let mate = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 1 1").unwrap();
    assert_eq!(mate.termination(), Some(Termination::Checkmate { mated: Color::Black }));
    assert!(!mate.has_legal_moves());
}

#[test]
fn insufficient_material_cases() {
    let dead = [
        "8/8/8/4k3/8/8/8/4K3 w - - 0 1",
        "8/8/8/4k3/8/8/8/4KN2 w - - 0 1",
        "8/8/8/4k3/8/8/8/4KB2 w - - 0 1",
        // both bishops on light squares
        "8/8/8/4k3/8/8/2b5/4KB2 w - - 0 1",
    ];
    for fen in dead {
        assert_eq!(Position::from_fen(fen).unwrap().termination(), Some(Termination::InsufficientMaterial), "{fen}");
    }
    let alive = [
        "8/8/8/4k3/8/8/8/4KR2 w - - 0 1",
        "8/8/8/4k3/8/8/8/3NKN2 w - - 0 1",
        "8/8/8/4k3/8/8/1b6/4KB2 w - - 0 1",
        "8/8/8/4k3/8/8/p7/4KN2 w - - 0 1",
    ];
    for fen in alive {
        assert_eq!(Position::from_fen(fen).unwrap().termination(), None, "{fen}");
    }
}

#[test]
fn every_draw_kind_is_a_draw() {
    for t in [
        Termination::Stalemate,
        Termination::InsufficientMaterial,
        Termination::SeventyFiveMoves,
        Termination::FivefoldRepetition,
    ] {
        assert!(t.is_draw());
    }
    assert!(!Termination::Checkmate { mated: Color::White }.is_draw());
}
