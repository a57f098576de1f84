mod common;

use common::{assignment, RecordingPipeline, ScriptedClient, ScriptedEngine, StubModel, WhenEmpty};
use cozy_chess::Color;
use piebot_live::arbiter::Arbiter;
use piebot_live::config::{ArbiterConfig, SessionConfig};
use piebot_live::error::SessionError;
use piebot_live::pipeline::BotRecord;
use piebot_live::record::GameResult;
use piebot_live::session::SessionController;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Rig {
    client: Arc<ScriptedClient>,
    engine: Arc<ScriptedEngine>,
    pipeline: Arc<RecordingPipeline>,
    controller: SessionController,
}

fn rig(client: ScriptedClient, engine: ScriptedEngine, session: SessionConfig) -> Rig {
    let client = Arc::new(client);
    let engine = Arc::new(engine);
    let pipeline = Arc::new(RecordingPipeline::default());
    let arbiter = Arc::new(Arbiter::new(Arc::new(StubModel::not_ready()), engine.clone(), &ArbiterConfig::default()));
    let controller = SessionController::new(client.clone(), arbiter, engine.clone(), pipeline.clone(), session);
    Rig { client, engine, pipeline, controller }
}

#[tokio::test]
async fn engine_only_game_plays_engine_moves_verbatim() {
    let client = ScriptedClient::new(Vec::new(), &["f2f3", "g2g4"], WhenEmpty::Idle);
    let r = rig(client, ScriptedEngine::with_moves(&["e7e5", "d8h4"]).with_eval(-30), SessionConfig::default());
    let mut tally = BotRecord::default();

    let result = r.controller.play(assignment("g1", Color::Black, None), &mut tally).await.unwrap();

    assert_eq!(result, GameResult::Win);
    assert_eq!(r.client.submitted(), vec!["e7e5", "d8h4"]);
    assert_eq!(tally, BotRecord { games_played: 1, wins: 1, losses: 0, draws: 0 });
    let records = r.pipeline.records();
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.moves, vec!["f2f3", "e7e5", "g2g4", "d8h4"]);
    assert_eq!(rec.color, "black");
    assert_eq!(rec.move_times.len(), 2);
    // one evaluation per half-move, in pawns
    assert_eq!(rec.evaluations, vec![-0.3; 4]);
    assert!(rec.pgn.contains("[Result \"0-1\"]"));
    assert!(rec.pgn.contains("2. g4 Qh4# 0-1"));
    assert_eq!(rec.termination.as_deref(), Some("checkmate (white mated)"));
    assert_eq!(r.engine.eval_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn illegal_opponent_move_ends_unknown_without_applying_it() {
    let client = ScriptedClient::new(Vec::new(), &["e2e4"], WhenEmpty::Idle);
    let r = rig(client, ScriptedEngine::with_moves(&["e2e4"]), SessionConfig::default());
    let mut tally = BotRecord::default();

    let result = r.controller.play(assignment("g2", Color::White, None), &mut tally).await.unwrap();

    assert_eq!(result, GameResult::Unknown);
    let rec = &r.pipeline.records()[0];
    assert_eq!(rec.moves, vec!["e2e4"]);
    assert_eq!(rec.result, GameResult::Unknown);
    assert!(rec.pgn.contains("[Result \"*\"]"));
    assert_eq!(tally.games_played, 1);
    assert_eq!(tally.wins + tally.losses + tally.draws, 0);
}

#[tokio::test]
async fn garbage_opponent_text_is_treated_like_an_illegal_move() {
    let client = ScriptedClient::new(Vec::new(), &["resign please"], WhenEmpty::Idle);
    let r = rig(client, ScriptedEngine::new(), SessionConfig::default());
    let mut tally = BotRecord::default();
    let result = r.controller.play(assignment("g3", Color::Black, None), &mut tally).await.unwrap();
    assert_eq!(result, GameResult::Unknown);
    assert!(r.pipeline.records()[0].moves.is_empty());
}

#[tokio::test]
async fn results_map_from_the_bots_side() {
    let mated_black = "R5k1/5ppp/8/8/8/8/8/6K1 b - - 1 1";
    let cases = [
        (mated_black, Color::White, GameResult::Win),
        (mated_black, Color::Black, GameResult::Loss),
        ("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", Color::White, GameResult::Draw),
        ("8/8/8/4k3/8/8/8/4K3 w - - 0 1", Color::Black, GameResult::Draw),
        ("4k3/8/8/8/8/8/8/R3K3 w - - 150 120", Color::White, GameResult::Draw),
    ];
    for (i, (fen, color, expected)) in cases.into_iter().enumerate() {
        let r = rig(ScriptedClient::new(Vec::new(), &[], WhenEmpty::Idle), ScriptedEngine::new(), SessionConfig::default());
        let mut tally = BotRecord::default();
        let result = r.controller.play(assignment(&format!("t{i}"), color, Some(fen)), &mut tally).await.unwrap();
        assert_eq!(result, expected, "{fen} as {color:?}");
        assert!(r.client.submitted().is_empty());
    }
}

#[tokio::test]
async fn seventy_five_move_draw_after_a_quiet_move() {
    let client = ScriptedClient::new(Vec::new(), &[], WhenEmpty::Idle);
    let r = rig(client, ScriptedEngine::with_moves(&["a1a2"]), SessionConfig::default());
    let mut tally = BotRecord::default();
    let fen = "4k3/8/8/8/8/8/8/R3K3 w - - 149 120";
    let result = r.controller.play(assignment("m75", Color::White, Some(fen)), &mut tally).await.unwrap();
    assert_eq!(result, GameResult::Draw);
    assert_eq!(r.client.submitted(), vec!["a1a2"]);
    let rec = &r.pipeline.records()[0];
    assert_eq!(rec.termination.as_deref(), Some("seventy-five-move rule"));
    assert_eq!(rec.initial_fen.as_deref(), Some(fen));
}

#[tokio::test]
async fn silent_opponent_gets_a_resignation_and_no_record() {
    let client = ScriptedClient::new(Vec::new(), &[], WhenEmpty::Idle);
    let cfg = SessionConfig { max_silent_waits: 3, ..SessionConfig::default() };
    let r = rig(client, ScriptedEngine::new(), cfg);
    let mut tally = BotRecord::default();
    let err = r.controller.play(assignment("quiet", Color::Black, None), &mut tally).await.unwrap_err();
    assert!(matches!(err, SessionError::OpponentSilent { waits: 3, .. }));
    assert!(r.client.resigned.load(Ordering::SeqCst));
    assert!(r.pipeline.records().is_empty());
    assert_eq!(tally, BotRecord::default());
}

#[tokio::test]
async fn rejected_submission_aborts_without_hand_off() {
    let mut client = ScriptedClient::new(Vec::new(), &[], WhenEmpty::Idle);
    client.accept_moves = false;
    let r = rig(client, ScriptedEngine::with_moves(&["d2d4"]), SessionConfig::default());
    let mut tally = BotRecord::default();
    let err = r.controller.play(assignment("rej", Color::White, None), &mut tally).await.unwrap_err();
    assert!(matches!(err, SessionError::MoveRejected { ref uci, .. } if uci == "d2d4"));
    assert!(r.pipeline.records().is_empty());
}

#[tokio::test]
async fn broken_engine_still_finishes_the_game() {
    // every oracle call fails: moves are random, evaluations fall back to even
    let client = ScriptedClient::new(Vec::new(), &[], WhenEmpty::Idle);
    let r = rig(client, ScriptedEngine::failing(), SessionConfig::default());
    let mut tally = BotRecord::default();
    // white to move with K+R vs K: any rook move keeps the game going until
    // the 75-move rule; start close to it
    let fen = "4k3/8/8/8/8/8/8/R3K3 w - - 148 100";
    let result = r.controller.play(assignment("rnd", Color::White, Some(fen)), &mut tally).await;
    // black never answers, so the session ends silent unless white's random
    // move already ended the game
    match result {
        Ok(res) => assert_ne!(res, GameResult::Unknown),
        Err(e) => assert!(matches!(e, SessionError::OpponentSilent { .. })),
    }
    assert_eq!(r.client.submitted().len(), 1);
}
