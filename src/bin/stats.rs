use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use piebot_live::pipeline::{GameAnalyzer, GameStore, JsonlGameStore};

#[derive(Parser, Debug)]
#[command(name = "piebot-stats", about = "Summarize the stored games")]
struct Args {
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Also list this many recent games
    #[arg(long, default_value_t = 0)]
    recent: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let store = JsonlGameStore::open(&args.data_dir)
        .with_context(|| format!("open game store in {}", args.data_dir.display()))?;
    let stats = store.statistics()?;
    println!(
        "games {}  wins {}  losses {}  draws {}  win rate {:.1}%",
        stats.games_played,
        stats.wins,
        stats.losses,
        stats.draws,
        stats.win_rate() * 100.0
    );
    if args.recent > 0 {
        let analyzer = GameAnalyzer::default();
        for g in store.recent_games(args.recent)? {
            let a = analyzer.analyze(&g);
            println!(
                "{}  {:<5} vs {:<16} {:<7} {:>3} plies  {:>6.1}s  mistakes {} blunders {}",
                g.started_at.format("%Y-%m-%d %H:%M"),
                g.color,
                g.opponent,
                g.result.to_string(),
                g.moves.len(),
                g.duration,
                a.mistakes,
                a.blunders
            );
        }
    }
    Ok(())
}
