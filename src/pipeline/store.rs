use log::debug;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::pipeline::BotRecord;
use crate::record::GameRecord;

/// Persistence of finished games. Game ids are unique.
pub trait GameStore: Send + Sync {
    fn save_game(&self, record: &GameRecord) -> Result<(), StoreError>;

    fn statistics(&self) -> Result<BotRecord, StoreError>;

    /// Up to `limit` most recent games, oldest first.
    fn recent_games(&self, limit: usize) -> Result<Vec<GameRecord>, StoreError>;

    fn close(&self) -> Result<(), StoreError> { Ok(()) }
}

pub const GAMES_FILE: &str = "games.jsonl";

struct Inner {
    ids: HashSet<String>,
    file: Option<File>,
}

/// Games as JSON lines in `<dir>/games.jsonl`, appended as they finish.
pub struct JsonlGameStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlGameStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(GAMES_FILE);
        let ids = if path.exists() {
            read_records(&path)?.into_iter().map(|r| r.game_id).collect()
        } else {
            HashSet::new()
        };
        debug!("game store {}: {} games", path.display(), ids.len());
        Ok(Self { path, inner: Mutex::new(Inner { ids, file: None }) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_records(path: &Path) -> Result<Vec<GameRecord>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let record = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        out.push(record);
    }
    Ok(out)
}

impl GameStore for JsonlGameStore {
    fn save_game(&self, record: &GameRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.ids.contains(&record.game_id) {
            return Err(StoreError::DuplicateGame(record.game_id.clone()));
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        if inner.file.is_none() {
            inner.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        if let Some(f) = inner.file.as_mut() {
            f.write_all(line.as_bytes())?;
            f.flush()?;
        }
        inner.ids.insert(record.game_id.clone());
        Ok(())
    }

    fn statistics(&self) -> Result<BotRecord, StoreError> {
        let _guard = self.lock();
        let mut stats = BotRecord::default();
        if self.path.exists() {
            for r in read_records(&self.path)? { stats.record(r.result); }
        }
        Ok(stats)
    }

    fn recent_games(&self, limit: usize) -> Result<Vec<GameRecord>, StoreError> {
        let _guard = self.lock();
        if !self.path.exists() { return Ok(Vec::new()); }
        let mut all = read_records(&self.path)?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }

    fn close(&self) -> Result<(), StoreError> {
        if let Some(mut f) = self.lock().file.take() {
            f.flush()?;
            f.sync_all()?;
        }
        Ok(())
    }
}
