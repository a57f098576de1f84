use cozy_chess::Move;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub key: u64,
    pub depth: u32,
    pub score: i32,
    pub best: Option<Move>,
    pub bound: Bound,
    pub gen: u32,
}

const WAYS: usize = 4;

#[derive(Default)]
struct Bucket {
    slots: [Option<Entry>; WAYS],
}

/// Bucketed transposition table shared by root workers through `Arc`.
pub struct Tt {
    buckets: Vec<Mutex<Bucket>>,
    gen: AtomicU32,
}

impl Default for Tt {
    fn default() -> Self { Self::with_entries(4096) }
}

impl Tt {
    pub fn with_entries(cap: usize) -> Self {
        let buckets = cap.max(WAYS).div_ceil(WAYS);
        let mut v = Vec::with_capacity(buckets);
        v.resize_with(buckets, || Mutex::new(Bucket::default()));
        Self { buckets: v, gen: AtomicU32::new(0) }
    }

    pub fn with_capacity_mb(mb: usize) -> Self {
        // ~64 bytes per entry
        Self::with_entries((mb.max(1) * 1024 * 1024) / 64)
    }

    fn bucket(&self, key: u64) -> &Mutex<Bucket> {
        let mixed = key ^ (key >> 32);
        &self.buckets[(mixed as usize) % self.buckets.len()]
    }

    pub fn get(&self, key: u64) -> Option<Entry> {
        let g = self.bucket(key).lock().ok()?;
        g.slots.iter().flatten().find(|e| e.key == key).copied()
    }

    pub fn put(&self, mut e: Entry) {
        let Ok(mut g) = self.bucket(e.key).lock() else { return };
        e.gen = self.gen.load(Ordering::Relaxed);
        if let Some(slot) = g.slots.iter_mut().find(|s| s.map_or(false, |cur| cur.key == e.key)) {
            if slot.map_or(true, |cur| e.depth >= cur.depth) { *slot = Some(e); }
            return;
        }
        if let Some(slot) = g.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(e);
            return;
        }
        // evict shallowest, then oldest
        let victim = g.slots.iter().enumerate()
            .min_by_key(|(_, s)| s.map(|cur| (cur.depth, cur.gen)).unwrap_or((0, 0)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        g.slots[victim] = Some(e);
    }

    pub fn len(&self) -> usize {
        self.buckets.iter()
            .filter_map(|b| b.lock().ok())
            .map(|g| g.slots.iter().flatten().count())
            .sum()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        for b in &self.buckets {
            if let Ok(mut g) = b.lock() { *g = Bucket::default(); }
        }
    }

    pub fn bump_generation(&self) { self.gen.fetch_add(1, Ordering::Relaxed); }
}
