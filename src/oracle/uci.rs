use async_trait::async_trait;
use cozy_chess::Move;
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::board::{Position, START_FEN};
use crate::error::OracleError;
use crate::oracle::{terminal_evaluation, Evaluation, SearchOracle};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct UciSettings {
    pub eval_depth: u32,
    pub threads: usize,
    pub hash_mb: usize,
    /// Upper bound on a fixed-depth evaluation.
    pub eval_timeout: Duration,
    /// Slack on top of the movetime before giving up on `bestmove`.
    pub reply_grace: Duration,
    /// How long a stopped search gets to deliver its last `bestmove`.
    pub stop_grace: Duration,
}

impl Default for UciSettings {
    fn default() -> Self {
        Self {
            eval_depth: 12,
            threads: 1,
            hash_mb: 16,
            eval_timeout: Duration::from_secs(10),
            reply_grace: Duration::from_secs(2),
            stop_grace: Duration::from_secs(2),
        }
    }
}

struct EngineIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    // Set once a search could not be stopped; its output may still arrive.
    broken: bool,
}

impl EngineIo {
    async fn send(&mut self, cmd: &str) -> Result<(), OracleError> {
        debug!("uci > {cmd}");
        self.stdin.write_all(cmd.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads lines until one starts with `marker`, returning everything read.
    async fn read_until(&mut self, marker: &str, limit: Duration) -> Result<Vec<String>, OracleError> {
        tokio::time::timeout(limit, self.collect_until(marker))
            .await
            .map_err(|_| OracleError::Timeout(limit))?
    }

    async fn collect_until(&mut self, marker: &str) -> Result<Vec<String>, OracleError> {
        let mut seen = Vec::new();
        loop {
            let line = self
                .lines
                .next_line()
                .await?
                .ok_or_else(|| OracleError::Protocol("engine closed its output".into()))?;
            debug!("uci < {line}");
            let done = line.starts_with(marker);
            seen.push(line);
            if done { return Ok(seen); }
        }
    }

    /// Runs one search and returns its output up to `bestmove`. A search
    /// that overruns `limit` is stopped and its late reply drained, so the
    /// next request never reads it.
    async fn search(
        &mut self,
        position: &str,
        go: &str,
        limit: Duration,
        grace: Duration,
    ) -> Result<Vec<String>, OracleError> {
        if self.broken {
            return Err(OracleError::Unavailable("engine stopped responding".into()));
        }
        self.send(position).await?;
        self.send(go).await?;
        match self.read_until("bestmove", limit).await {
            Err(OracleError::Timeout(t)) => {
                warn!("no bestmove after {t:?}, stopping the search");
                if let Err(e) = self.abort_search(grace).await {
                    warn!("engine did not wind down ({e}), giving up on it");
                    self.broken = true;
                }
                Err(OracleError::Timeout(t))
            }
            other => other,
        }
    }

    async fn abort_search(&mut self, grace: Duration) -> Result<(), OracleError> {
        self.send("stop").await?;
        let stale = self.read_until("bestmove", grace).await?;
        debug!("discarded {} line(s) of a stopped search", stale.len());
        Ok(())
    }
}

/// An external engine speaking UCI over stdin/stdout. Requests are
/// serialized over the one process.
pub struct UciEngineOracle {
    io: Mutex<EngineIo>,
    name: String,
    settings: UciSettings,
}

impl UciEngineOracle {
    pub async fn spawn(path: impl AsRef<OsStr>, settings: UciSettings) -> Result<Self, OracleError> {
        Self::spawn_with_args(path, std::iter::empty::<&str>(), settings).await
    }

    pub async fn spawn_with_args<I, S>(
        program: impl AsRef<OsStr>,
        args: I,
        settings: UciSettings,
    ) -> Result<Self, OracleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("spawn {}: {e}", program.as_ref().to_string_lossy())))?;
        let stdin = child.stdin.take().ok_or_else(|| OracleError::Protocol("no stdin pipe".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| OracleError::Protocol("no stdout pipe".into()))?;
        let mut io = EngineIo { child, stdin, lines: BufReader::new(stdout).lines(), broken: false };

        io.send("uci").await?;
        let intro = io.read_until("uciok", HANDSHAKE_TIMEOUT).await?;
        let name = intro
            .iter()
            .find_map(|l| l.strip_prefix("id name "))
            .unwrap_or("uci engine")
            .to_string();
        io.send(&format!("setoption name Threads value {}", settings.threads.max(1))).await?;
        io.send(&format!("setoption name Hash value {}", settings.hash_mb.max(1))).await?;
        io.send("isready").await?;
        io.read_until("readyok", HANDSHAKE_TIMEOUT).await?;
        info!("uci engine ready: {name}");
        Ok(Self { io: Mutex::new(io), name, settings })
    }

    pub fn name(&self) -> &str { &self.name }
}

fn position_command(position: &Position) -> String {
    let initial = position.initial_fen();
    let mut cmd = if initial == START_FEN {
        "position startpos".to_string()
    } else {
        format!("position fen {initial}")
    };
    let moves = position.uci_history();
    if !moves.is_empty() {
        cmd.push_str(" moves ");
        cmd.push_str(&moves.join(" "));
    }
    cmd
}

/// Score from an `info` line, in centipawns for the side to move.
fn parse_score(line: &str) -> Option<i32> {
    let mut it = line.split_whitespace().skip_while(|t| *t != "score").skip(1);
    let kind = it.next()?;
    let value: i32 = it.next()?.parse().ok()?;
    match kind {
        "cp" => Some(value),
        "mate" if value > 0 => Some(Evaluation::MAX_CP),
        "mate" => Some(-Evaluation::MAX_CP),
        _ => None,
    }
}

fn parse_bestmove(lines: &[String]) -> Option<&str> {
    lines.last()?.split_whitespace().nth(1)
}

#[async_trait]
impl SearchOracle for UciEngineOracle {
    async fn best_move(&self, position: &Position, budget: Duration) -> Result<Move, OracleError> {
        let limit = budget + self.settings.reply_grace;
        let go = format!("go movetime {}", budget.as_millis().max(1));
        let mut io = self.io.lock().await;
        let reply = io.search(&position_command(position), &go, limit, self.settings.stop_grace).await?;
        match parse_bestmove(&reply) {
            None | Some("(none)") | Some("0000") => Err(OracleError::NoMove),
            Some(text) => Ok(position.parse_uci(text)?),
        }
    }

    async fn evaluate(&self, position: &Position) -> Result<Evaluation, OracleError> {
        if let Some(e) = terminal_evaluation(position) { return Ok(e); }
        let go = format!("go depth {}", self.settings.eval_depth);
        let mut io = self.io.lock().await;
        let reply = io
            .search(&position_command(position), &go, self.settings.eval_timeout, self.settings.stop_grace)
            .await?;
        let cp = reply
            .iter()
            .filter(|l| l.starts_with("info"))
            .filter_map(|l| parse_score(l))
            .last()
            .ok_or_else(|| OracleError::Protocol("no score reported".into()))?;
        Ok(Evaluation::from_side_cp(position.side_to_move(), cp))
    }

    async fn shutdown(&self) -> Result<(), OracleError> {
        let mut io = self.io.lock().await;
        io.send("quit").await?;
        match tokio::time::timeout(Duration::from_secs(1), io.child.wait()).await {
            Ok(status) => {
                debug!("{} exited: {}", self.name, status?);
            }
            Err(_) => {
                warn!("{} ignored quit, killing", self.name);
                io.child.kill().await?;
            }
        }
        Ok(())
    }
}
