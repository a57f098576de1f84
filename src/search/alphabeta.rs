use cozy_chess::{Board, Move, Piece};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::cozy::is_capture;
use crate::search::eval::{eval_cp, piece_value, DRAW_SCORE, MATE_SCORE};
use crate::search::see::see_gain_cp;
use crate::search::tt::{Bound, Entry, Tt};

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub depth: u32,
    pub max_nodes: Option<u64>,
    pub movetime: Option<Duration>,
    pub threads: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { depth: 4, max_nodes: None, movetime: None, threads: 1 }
    }
}

#[derive(Default, Debug, Clone)]
pub struct SearchResult {
    pub bestmove: Option<Move>,
    pub score_cp: i32,
    pub nodes: u64,
    pub depth: u32,
}

pub struct Searcher {
    tt: Arc<Tt>,
    nodes: u64,
    node_limit: u64,
    deadline: Option<Instant>,
    // Limits only apply once a full iteration has produced a move.
    may_stop: bool,
    stopped: bool,
    history: Vec<i32>,
    killers: Vec<[Option<Move>; 2]>,
}

impl Default for Searcher {
    fn default() -> Self { Self::with_tt(Arc::new(Tt::default())) }
}

impl Searcher {
    pub fn with_tt(tt: Arc<Tt>) -> Self {
        Self {
            tt,
            nodes: 0,
            node_limit: u64::MAX,
            deadline: None,
            may_stop: false,
            stopped: false,
            history: vec![0; 64 * 64],
            killers: vec![[None, None]; 128],
        }
    }

    pub fn set_tt_capacity_mb(&mut self, mb: usize) {
        self.tt = Arc::new(Tt::with_capacity_mb(mb));
    }

    pub fn clear(&mut self) {
        self.tt.clear();
        self.history.iter_mut().for_each(|h| *h = 0);
    }

    pub fn tt_probe(&self, board: &Board) -> Option<(u32, Bound)> {
        self.tt.get(board.hash()).map(|e| (e.depth, e.bound))
    }

    /// Fixed-depth search without time or node limits.
    pub fn search_depth(&mut self, board: &Board, depth: u32) -> SearchResult {
        self.search_with_params(board, SearchParams { depth, ..SearchParams::default() })
    }

    /// Iterative deepening up to `params.depth`, stopping early on the
    /// deadline or node budget. Depth 1 always completes.
    pub fn search_with_params(&mut self, board: &Board, params: SearchParams) -> SearchResult {
        self.nodes = 0;
        self.stopped = false;
        self.may_stop = false;
        self.node_limit = params.max_nodes.unwrap_or(u64::MAX);
        self.deadline = params.movetime.map(|d| Instant::now() + d);
        self.killers.iter_mut().for_each(|k| *k = [None, None]);

        let mut best = SearchResult::default();
        for d in 1..=params.depth.max(1) {
            self.tt.bump_generation();
            let r = if params.threads > 1 && d > 1 {
                self.root_parallel(board, d, params.threads)
            } else {
                self.root(board, d)
            };
            if self.stopped && best.bestmove.is_some() { break; }
            best = SearchResult { nodes: self.nodes, ..r };
            self.may_stop = true;
            if best.bestmove.is_none() || best.score_cp.abs() >= MATE_SCORE - 64 { break; }
            if self.out_of_budget() { break; }
        }
        best.nodes = self.nodes;
        best
    }

    fn out_of_budget(&self) -> bool {
        self.nodes >= self.node_limit || self.deadline.map_or(false, |dl| Instant::now() >= dl)
    }

    fn check_stop(&mut self) -> bool {
        if self.may_stop && !self.stopped && (self.nodes & 255 == 0 || self.nodes >= self.node_limit) && self.out_of_budget() {
            self.stopped = true;
        }
        self.stopped
    }

    fn root(&mut self, board: &Board, depth: u32) -> SearchResult {
        let moves = self.ordered_moves(board, 0);
        if moves.is_empty() {
            return SearchResult { bestmove: None, score_cp: self.eval_terminal(board, 0), nodes: self.nodes, depth };
        }
        let mut alpha = -MATE_SCORE;
        let beta = MATE_SCORE;
        let mut best: Option<(Move, i32)> = None;
        for m in moves {
            let mut child = board.clone();
            child.play(m);
            let score = -self.alphabeta(&child, depth - 1, -beta, -alpha, 1);
            if self.stopped { break; }
            if best.map_or(true, |(_, s)| score > s) { best = Some((m, score)); }
            if score > alpha { alpha = score; }
        }
        let (bm, sc) = match best {
            Some(b) => b,
            None => return SearchResult { bestmove: None, score_cp: 0, nodes: self.nodes, depth },
        };
        if !self.stopped {
            self.tt.put(Entry { key: board.hash(), depth, score: sc, best: Some(bm), bound: Bound::Exact, gen: 0 });
        }
        SearchResult { bestmove: Some(bm), score_cp: sc, nodes: self.nodes, depth }
    }

    // Each root move is searched with a full window by its own worker; the
    // transposition table is the only shared state.
    fn root_parallel(&mut self, board: &Board, depth: u32, threads: usize) -> SearchResult {
        let moves = self.ordered_moves(board, 0);
        if moves.is_empty() {
            return SearchResult { bestmove: None, score_cp: self.eval_terminal(board, 0), nodes: self.nodes, depth };
        }
        let tt = self.tt.clone();
        let deadline = self.deadline;
        let node_limit = self.node_limit;
        let work = || -> Vec<(Move, i32, u64, bool)> {
            moves.par_iter().map(|&m| {
                let mut w = Searcher::with_tt(tt.clone());
                w.deadline = deadline;
                w.node_limit = node_limit;
                w.may_stop = true;
                let mut child = board.clone();
                child.play(m);
                let score = -w.alphabeta(&child, depth - 1, -MATE_SCORE, MATE_SCORE, 1);
                (m, score, w.nodes, w.stopped)
            }).collect()
        };
        let results = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(work),
            Err(_) => work(),
        };
        let mut best: Option<(Move, i32)> = None;
        for (m, s, n, stopped) in results {
            self.nodes += n;
            if stopped { self.stopped = true; continue; }
            if best.map_or(true, |(_, bs)| s > bs) { best = Some((m, s)); }
        }
        match best {
            Some((bm, sc)) => {
                if !self.stopped {
                    self.tt.put(Entry { key: board.hash(), depth, score: sc, best: Some(bm), bound: Bound::Exact, gen: 0 });
                }
                SearchResult { bestmove: Some(bm), score_cp: sc, nodes: self.nodes, depth }
            }
            None => SearchResult { bestmove: None, score_cp: 0, nodes: self.nodes, depth },
        }
    }

    fn alphabeta(&mut self, board: &Board, depth: u32, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        self.nodes += 1;
        if self.check_stop() { return 0; }
        if depth == 0 { return self.qsearch(board, alpha, beta, ply); }

        let key = board.hash();
        let tt_entry = self.tt.get(key);
        if let Some(en) = tt_entry {
            if en.depth >= depth {
                match en.bound {
                    Bound::Exact => return en.score,
                    Bound::Lower if en.score >= beta => return en.score,
                    Bound::Upper if en.score <= alpha => return en.score,
                    _ => {}
                }
            }
        }

        let moves = self.ordered_moves(board, ply);
        if moves.is_empty() { return self.eval_terminal(board, ply as i32); }

        let orig_alpha = alpha;
        let mut best = -MATE_SCORE;
        let mut best_move = None;
        for m in moves {
            let mut child = board.clone();
            child.play(m);
            let score = -self.alphabeta(&child, depth - 1, -beta, -alpha, ply + 1);
            if self.stopped { return 0; }
            if score > best { best = score; best_move = Some(m); }
            if score > alpha { alpha = score; }
            if alpha >= beta {
                if !is_capture(board, m) {
                    self.update_killers(ply, m);
                    self.history[history_index(m)] += (depth * depth) as i32;
                }
                break;
            }
        }
        let bound = if best <= orig_alpha { Bound::Upper } else if best >= beta { Bound::Lower } else { Bound::Exact };
        self.tt.put(Entry { key, depth, score: best, best: best_move, bound, gen: 0 });
        best
    }

    fn qsearch(&mut self, board: &Board, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        let stand = eval_cp(board);
        if stand >= beta { return beta; }
        if stand > alpha { alpha = stand; }
        if ply >= 64 { return alpha; }

        let mut caps: Vec<(Move, i32)> = Vec::new();
        board.generate_moves(|ml| {
            for m in ml {
                if is_capture(board, m) || m.promotion == Some(Piece::Queen) {
                    let gain = see_gain_cp(board, m).unwrap_or(piece_value(Piece::Queen) - piece_value(Piece::Pawn));
                    caps.push((m, gain));
                }
            }
            false
        });
        caps.sort_by_key(|&(_, g)| -g);
        for (m, gain) in caps {
            if gain < 0 || stand + gain + 50 < alpha { continue; }
            self.nodes += 1;
            if self.check_stop() { return alpha; }
            let mut child = board.clone();
            child.play(m);
            let score = -self.qsearch(&child, -beta, -alpha, ply + 1);
            if score >= beta { return beta; }
            if score > alpha { alpha = score; }
        }
        alpha
    }

    fn ordered_moves(&self, board: &Board, ply: usize) -> Vec<Move> {
        let tt_move = self.tt.get(board.hash()).and_then(|e| e.best);
        let mut scored: Vec<(Move, i32)> = Vec::with_capacity(48);
        board.generate_moves(|ml| {
            for m in ml {
                let score = if Some(m) == tt_move {
                    1_000_000
                } else if is_capture(board, m) {
                    100_000 + see_gain_cp(board, m).unwrap_or(0)
                } else if let Some(p) = m.promotion {
                    90_000 + piece_value(p)
                } else {
                    self.killer_bonus(ply, m) + self.history[history_index(m)].min(40_000)
                };
                scored.push((m, score));
            }
            false
        });
        scored.sort_by_key(|&(_, s)| -s);
        scored.into_iter().map(|(m, _)| m).collect()
    }

    fn update_killers(&mut self, ply: usize, m: Move) {
        let Some(slot) = self.killers.get_mut(ply) else { return };
        if slot[0] == Some(m) { return; }
        slot[1] = slot[0];
        slot[0] = Some(m);
    }

    fn killer_bonus(&self, ply: usize, m: Move) -> i32 {
        match self.killers.get(ply) {
            Some(slot) if slot[0] == Some(m) => 50_000,
            Some(slot) if slot[1] == Some(m) => 45_000,
            _ => 0,
        }
    }

    fn eval_terminal(&self, board: &Board, ply: i32) -> i32 {
        if !board.checkers().is_empty() { return -MATE_SCORE + ply; }
        DRAW_SCORE
    }
}

fn history_index(m: Move) -> usize {
    (m.from as usize) * 64 + m.to as usize
}
