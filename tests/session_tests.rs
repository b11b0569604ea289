#![cfg(unix)]

mod common;

use cestt::chess::STARTING_FEN;
use cestt::engine::{EngineConfig, EngineSession, SearchLimit, Score};
use cestt::instrumentation::InstrumentationManifest;
use cestt::HarnessError;
use common::FakeEngine;
use serde_json::json;
use std::time::{Duration, Instant};

const BLACK_TO_MOVE: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

fn limit() -> SearchLimit {
    SearchLimit::MoveTime(Duration::from_millis(10))
}

#[test]
fn test_open_applies_merged_options() {
    let engine = FakeEngine::new();
    let config = engine.config().with_threads(2).with_option("debug log", "on");
    let session = EngineSession::open(engine.program(), config, None).unwrap();

    let identity = session.identity().cloned().unwrap_or_default();
    assert_eq!(identity.name.as_deref(), Some("FakeFish 1.0"));
    assert!(session.rejected_options().is_empty());
    assert!(session.close().is_some());

    let received = engine.received();
    assert_eq!(received.first().map(String::as_str), Some("uci"));
    for expected in [
        "setoption name Threads value 2",
        "setoption name Hash value 128",
        "setoption name MultiPV value 1",
        "setoption name Debug Log value true",
        "isready",
        "quit",
    ] {
        assert!(received.iter().any(|line| line == expected), "missing {expected}");
    }
}

#[test]
fn test_rejected_options_do_not_abort_open() {
    let engine = FakeEngine::new();
    let config = engine
        .config()
        .with_option("Hash", "999999")
        .with_option("SyzygyPath", "/tb");
    let mut session = EngineSession::open(engine.program(), config, None).unwrap();

    assert_eq!(session.rejected_options().len(), 2);
    let (cp, _) = session.analyze(STARTING_FEN, limit()).unwrap();
    assert_eq!(cp, 25);
    session.close();

    let received = engine.received();
    assert!(!received.iter().any(|line| line.contains("SyzygyPath")));
    assert!(!received.iter().any(|line| line.contains("999999")));
}

#[test]
fn test_analyze_start_position() {
    let engine = FakeEngine::new();
    let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    let (cp, info) = session.analyze(STARTING_FEN, limit()).unwrap();
    session.close();

    assert_eq!(cp, 25);
    assert_eq!(info.score, Some(Score::Cp(25)));
    assert_eq!(info.best_move.as_deref(), Some("e2e4"));
    assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
    assert_eq!(info.multipv(), 2);
    assert_eq!(info.nodes, Some(120));

    let received = engine.received();
    assert!(received.iter().any(|line| line == "position startpos"));
    assert!(received.iter().any(|line| line == "go movetime 10"));
}

#[test]
fn test_depth_limit_and_fen_position() {
    let engine = FakeEngine::new();
    let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    session.analyze(BLACK_TO_MOVE, SearchLimit::new(None, None)).unwrap();
    session.close();

    let received = engine.received();
    assert!(received.contains(&format!("position fen {BLACK_TO_MOVE}")));
    assert!(received.iter().any(|line| line == "go depth 10"));
}

#[test]
fn test_score_is_white_relative() {
    let engine = FakeEngine::with_score("cp 30");
    let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    let (cp, _) = session.analyze(BLACK_TO_MOVE, limit()).unwrap();
    assert_eq!(cp, -30);
}

#[test]
fn test_large_and_mate_scores_are_clamped() {
    for (clause, expected) in [
        ("cp 5000", 2000),
        ("cp -2500", -2000),
        ("mate 3", 2000),
        ("mate -2", -2000),
        ("none", 0),
    ] {
        let engine = FakeEngine::with_score(clause);
        let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
        let (cp, _) = session.analyze(STARTING_FEN, limit()).unwrap();
        assert_eq!(cp, expected, "score clause {clause}");
    }
}

#[test]
fn test_invalid_fen_is_an_error() {
    let engine = FakeEngine::new();
    let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    let err = session.analyze("not a fen", limit()).unwrap_err();
    assert!(matches!(err, HarnessError::Chess(_)));
}

#[test]
fn test_manifest_handshake_replayed_on_open() {
    let engine = FakeEngine::new();
    let manifest = match json!({
        "package": "hooks",
        "handshake": {
            "options": {"Debug Log": true, "Bogus": 1},
            "commands": ["debug on", "asm hook search"],
            "token": "T-7"
        }
    }) {
        serde_json::Value::Object(map) => InstrumentationManifest::from_document(None, map),
        _ => unreachable!(),
    };

    let session = EngineSession::open(engine.program(), engine.config(), Some(&manifest)).unwrap();
    // Neither Bogus nor the token option is declared by the engine.
    assert_eq!(session.rejected_options().len(), 2);
    session.close();

    let received = engine.received();
    assert!(received.iter().any(|line| line == "setoption name Debug Log value true"));
    let debug_on = received.iter().position(|line| line == "debug on").unwrap();
    let hook = received.iter().position(|line| line == "asm hook search").unwrap();
    let ready = received.iter().position(|line| line == "isready").unwrap();
    assert!(ready < debug_on && debug_on < hook);
    assert!(manifest.warnings().is_empty());
}

#[test]
fn test_raw_commands_and_close() {
    let engine = FakeEngine::new();
    let mut session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    assert!(session.send_raw_command("ucinewgame"));
    let _ = session.resource_snapshot();
    assert!(session.close().is_some());
    assert!(engine.received().iter().any(|line| line == "ucinewgame"));
}

#[test]
fn test_drop_reaps_engine_without_close() {
    let engine = FakeEngine::new();
    let session = EngineSession::open(engine.program(), engine.config(), None).unwrap();
    drop(session);
    assert_eq!(engine.received().last().map(String::as_str), Some("quit"));
}

#[test]
fn test_engine_that_never_answers_uci_fails_open() {
    let engine = FakeEngine::new();
    let config = EngineConfig {
        args: vec!["-c".to_string(), "exit 0".to_string()],
        ..EngineConfig::default()
    };
    let err = EngineSession::open(engine.program(), config, None).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::ProtocolViolation(_) | HarnessError::Io(_)
    ));
}

#[test]
fn test_silent_engine_times_out_during_open() {
    let engine = FakeEngine::mute();
    let config = engine
        .config()
        .with_reply_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let err = EngineSession::open(engine.program(), config, None).unwrap_err();

    assert!(matches!(err, HarnessError::ProtocolViolation(ref msg) if msg.contains("did not reply")));
    assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
}
