use piebot_live::config::BotConfig;
use piebot_live::error::ConfigError;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn empty_file_gives_defaults() {
    let cfg: BotConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.arbiter.tolerance_cp, 100);
    assert_eq!(cfg.arbiter.short_budget_ms, 500);
    assert_eq!(cfg.arbiter.long_budget_ms, 1000);
    assert_eq!(cfg.session.max_silent_waits, 60);
    assert_eq!(cfg.matchmaking.idle_ms, 10_000);
    assert_eq!(cfg.matchmaking.backoff_ms, 30_000);
    assert_eq!(cfg.pipeline.retrain_every, 10);
    assert!(cfg.model.path.is_none());
    cfg.validate().unwrap();
}

#[test]
fn partial_sections_keep_other_defaults() {
    let text = r#"
        [arbiter]
        tolerance_cp = 40
        seed = 7

        [pipeline]
        data_dir = "/tmp/bot"

        [search]
        uci_engine = "/usr/bin/stockfish"
    "#;
    let cfg: BotConfig = toml::from_str(text).unwrap();
    assert_eq!(cfg.arbiter.tolerance_cp, 40);
    assert_eq!(cfg.arbiter.seed, Some(7));
    assert_eq!(cfg.arbiter.long_budget_ms, 1000);
    assert_eq!(cfg.pipeline.data_dir, PathBuf::from("/tmp/bot"));
    assert_eq!(cfg.pipeline.export_games, 100);
    assert_eq!(cfg.search.uci_engine, Some(PathBuf::from("/usr/bin/stockfish")));
    assert_eq!(cfg.search.eval_depth, 5);
}

#[test]
fn validation_rejects_nonsense() {
    let bad = [
        "[arbiter]\ntolerance_cp = -1",
        "[arbiter]\nshort_budget_ms = 0",
        "[session]\nmax_silent_waits = 0",
        "[search]\nthreads = 0",
        "[pipeline]\nretrain_every = 0",
        "[pipeline]\nmistake_pawns = 6.0\nblunder_pawns = 5.0",
    ];
    for text in bad {
        let cfg: BotConfig = toml::from_str(text).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))), "{text}");
    }
}

#[test]
fn load_reads_and_validates_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bot.toml");

    std::fs::write(&path, "[matchmaking]\nmax_games = 3\n").unwrap();
    assert_eq!(BotConfig::load(&path).unwrap().matchmaking.max_games, Some(3));

    std::fs::write(&path, "[session]\nopponent_wait_ms = 0\n").unwrap();
    assert!(matches!(BotConfig::load(&path), Err(ConfigError::Validation(_))));

    std::fs::write(&path, "[session\n").unwrap();
    assert!(matches!(BotConfig::load(&path), Err(ConfigError::TomlParse(_))));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(BotConfig::load(&missing), Err(ConfigError::FileRead { .. })));
    let cfg = BotConfig::load_or_default(&missing).unwrap();
    assert_eq!(cfg.session.bot_name, "PieBot");
}
