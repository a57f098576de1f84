//! Training-shard export and the retraining trigger.
//!
//! Shard format: magic `PIESP001`, then fixed 12-byte records:
//! u64 position hash (LE), i8 result from White's side, u8 side to move
//! (0 white, 1 black), 2 reserved bytes.

use anyhow::{Context, Result};
use cozy_chess::Color;
use log::info;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::oracle::PredictiveOracle;
use crate::pipeline::GameStore;
use crate::record::{GameRecord, GameResult};

pub const SHARD_MAGIC: &[u8; 8] = b"PIESP001";
pub const RECORD_SIZE: usize = 8 + 1 + 1 + 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingRecord {
    pub key: u64,
    pub result: i8,
    pub stm: u8,
}

/// Result from White's side; `None` for games without a usable label.
fn white_result(record: &GameRecord) -> Option<i8> {
    let bot = record.bot_color()?;
    let sign = if bot == Color::White { 1 } else { -1 };
    match record.result {
        GameResult::Win => Some(sign),
        GameResult::Loss => Some(-sign),
        GameResult::Draw => Some(0),
        GameResult::Unknown => None,
    }
}

/// One training record per position before each played move.
pub fn flatten_game(record: &GameRecord) -> Vec<TrainingRecord> {
    let Some(result) = white_result(record) else { return Vec::new() };
    let positions = record.replay();
    let played = positions.len().saturating_sub(1);
    positions
        .iter()
        .take(played)
        .map(|p| TrainingRecord {
            key: p.board().hash(),
            result,
            stm: if p.side_to_move() == Color::White { 0 } else { 1 },
        })
        .collect()
}

pub fn write_shards<P: AsRef<Path>>(
    games: &[GameRecord],
    out_dir: P,
    max_records_per_shard: usize,
) -> std::io::Result<Vec<PathBuf>> {
    create_dir_all(&out_dir)?;
    let mut out_paths = Vec::new();
    let mut writer: Option<BufWriter<File>> = None;
    let mut in_shard = 0usize;

    for r in games.iter().flat_map(flatten_game) {
        if writer.is_none() || in_shard >= max_records_per_shard {
            if let Some(mut done) = writer.take() { done.flush()?; }
            let path = out_dir.as_ref().join(format!("shard_{:06}.bin", out_paths.len()));
            let mut f = BufWriter::new(File::create(&path)?);
            f.write_all(SHARD_MAGIC)?;
            out_paths.push(path);
            writer = Some(f);
            in_shard = 0;
        }
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(&r.key.to_le_bytes());
        buf[8] = r.result as u8;
        buf[9] = r.stm;
        if let Some(w) = writer.as_mut() { w.write_all(&buf)?; }
        in_shard += 1;
    }
    if let Some(mut w) = writer { w.flush()?; }
    Ok(out_paths)
}

pub fn read_shard<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<TrainingRecord>> {
    let mut f = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 8];
    f.read_exact(&mut magic)?;
    if &magic != SHARD_MAGIC {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad shard magic"));
    }
    let mut recs = Vec::new();
    let mut buf = [0u8; RECORD_SIZE];
    loop {
        match f.read_exact(&mut buf) {
            Ok(()) => {
                let mut key = [0u8; 8];
                key.copy_from_slice(&buf[0..8]);
                recs.push(TrainingRecord { key: u64::from_le_bytes(key), result: buf[8] as i8, stm: buf[9] });
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(recs)
}

/// Writes the most recent stored games as shards, one directory per round.
pub struct ShardExporter {
    store: Arc<dyn GameStore>,
    out_dir: PathBuf,
    games: usize,
    records_per_shard: usize,
}

impl ShardExporter {
    pub fn new(
        store: Arc<dyn GameStore>,
        out_dir: impl Into<PathBuf>,
        games: usize,
        records_per_shard: usize,
    ) -> Self {
        Self { store, out_dir: out_dir.into(), games, records_per_shard: records_per_shard.max(1) }
    }

    pub fn export(&self) -> Result<Vec<PathBuf>> {
        let games = self.store.recent_games(self.games).context("load recent games")?;
        let round = self.out_dir.join(format!("round_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f")));
        let paths = write_shards(&games, &round, self.records_per_shard)
            .with_context(|| format!("write shards to {}", round.display()))?;
        info!("exported {} games to {} shard(s) in {}", games.len(), paths.len(), round.display());
        Ok(paths)
    }
}

/// Exports fresh training data, then asks the model to pick up new weights.
pub struct Retrainer {
    exporter: ShardExporter,
    model: Arc<dyn PredictiveOracle>,
}

impl Retrainer {
    pub fn new(exporter: ShardExporter, model: Arc<dyn PredictiveOracle>) -> Self {
        Self { exporter, model }
    }

    /// Returns the number of shards written.
    pub async fn retrain(&self) -> Result<usize> {
        let shards = self.exporter.export()?;
        let ready = self.model.reload().await.context("reload model")?;
        info!("model reload done, ready: {ready}");
        Ok(shards.len())
    }
}
