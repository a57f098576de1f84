use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use piebot_live::arbiter::Arbiter;
use piebot_live::client::{GameClient, LocalArena};
use piebot_live::config::BotConfig;
use piebot_live::matchmaking::Matchmaker;
use piebot_live::oracle::builtin::BuiltinSettings;
use piebot_live::oracle::uci::UciSettings;
use piebot_live::oracle::{AlphaBetaOracle, NetOracle, NoModel, PredictiveOracle, SearchOracle, UciEngineOracle};
use piebot_live::pipeline::{GameAnalyzer, GameStore, JsonlGameStore, LearningPipeline, PostGamePipeline, Retrainer, ShardExporter};
use piebot_live::session::SessionController;

#[derive(Parser, Debug)]
#[command(name = "piebot-live", version, about = "Play games with model/engine move arbitration")]
struct Args {
    /// TOML config; defaults are used when the file is missing
    #[arg(long, default_value = "piebot.toml")]
    config: PathBuf,

    /// Value-net weights (PIENNUE1)
    #[arg(long)]
    model: Option<PathBuf>,

    /// External UCI engine binary; the builtin searcher otherwise
    #[arg(long)]
    uci_engine: Option<PathBuf>,

    /// Stop after this many games
    #[arg(long)]
    games: Option<u64>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Search depth of the arena opponent
    #[arg(long)]
    opponent_depth: Option<u32>,
}

impl Args {
    fn apply(&self, cfg: &mut BotConfig) {
        if let Some(p) = &self.model { cfg.model.path = Some(p.clone()); }
        if let Some(p) = &self.uci_engine { cfg.search.uci_engine = Some(p.clone()); }
        if let Some(n) = self.games { cfg.matchmaking.max_games = Some(n); }
        if let Some(d) = &self.data_dir { cfg.pipeline.data_dir = d.clone(); }
        if let Some(d) = self.opponent_depth { cfg.arena.opponent_depth = d; }
    }
}

async fn search_oracle(cfg: &BotConfig) -> Result<Arc<dyn SearchOracle>> {
    match &cfg.search.uci_engine {
        Some(path) => {
            let settings = UciSettings {
                eval_depth: cfg.search.uci_eval_depth,
                threads: cfg.search.threads,
                hash_mb: cfg.search.hash_mb,
                ..UciSettings::default()
            };
            let engine = UciEngineOracle::spawn(path, settings)
                .await
                .with_context(|| format!("start UCI engine {}", path.display()))?;
            Ok(Arc::new(engine))
        }
        None => Ok(Arc::new(AlphaBetaOracle::new(BuiltinSettings {
            max_depth: cfg.search.max_depth,
            eval_depth: cfg.search.eval_depth,
            threads: cfg.search.threads,
            hash_mb: cfg.search.hash_mb,
        }))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut cfg = BotConfig::load_or_default(&args.config).context("load config")?;
    args.apply(&mut cfg);
    cfg.validate().context("invalid settings")?;

    let engine = search_oracle(&cfg).await?;
    let model: Arc<dyn PredictiveOracle> = match &cfg.model.path {
        Some(p) => Arc::new(NetOracle::from_path(p)),
        None => Arc::new(NoModel),
    };
    info!("model ready: {}", model.is_ready());

    let store: Arc<dyn GameStore> = Arc::new(JsonlGameStore::open(&cfg.pipeline.data_dir).context("open game store")?);
    let mut tally = store.statistics().context("read game statistics")?;
    info!("starting from {} games ({} wins)", tally.games_played, tally.wins);

    let exporter = ShardExporter::new(
        store.clone(),
        cfg.pipeline.data_dir.join("shards"),
        cfg.pipeline.export_games,
        cfg.pipeline.records_per_shard,
    );
    let pipeline: Arc<dyn PostGamePipeline> = Arc::new(LearningPipeline::new(
        store,
        GameAnalyzer::new(cfg.pipeline.mistake_pawns, cfg.pipeline.blunder_pawns),
        Some(Retrainer::new(exporter, model.clone())),
        cfg.pipeline.retrain_every,
    ));

    let opponent = Arc::new(AlphaBetaOracle::new(BuiltinSettings {
        max_depth: cfg.arena.opponent_depth,
        threads: 1,
        ..BuiltinSettings::default()
    }));
    let arena = LocalArena::new(opponent, &cfg.arena, &cfg.session).context("arena setup")?;
    let client: Arc<dyn GameClient> = Arc::new(arena);

    let arbiter = Arc::new(Arbiter::new(model, engine.clone(), &cfg.arbiter));
    let sessions =
        SessionController::new(client.clone(), arbiter, engine.clone(), pipeline.clone(), cfg.session.clone());
    let matchmaker = Matchmaker::new(client, sessions, engine, pipeline, cfg.matchmaking.clone());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, finishing the current game");
                on_signal.cancel();
            }
            Err(e) => warn!("cannot listen for ctrl-c: {e}"),
        }
    });

    let played = matchmaker.run(&mut tally, cancel).await;
    info!(
        "done: {played} game(s) this run; overall {}W/{}L/{}D ({:.1}% wins)",
        tally.wins,
        tally.losses,
        tally.draws,
        tally.win_rate() * 100.0
    );
    Ok(())
}
