use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use rand::Rng;

/// Picks the member index serving one request for a multi-member pool.
///
/// Implementations must not block and must be safe under concurrent calls.
pub trait SelectionStrategy: Send + Sync + 'static {
    /// `len` is always at least 1
    fn pick(
        &self,
        name: &str,
        len: usize,
    ) -> usize;

    /// Drops any state kept for `name` once its pool is gone.
    fn forget(
        &self,
        _name: &str,
    ) {
    }
}

/// Cycles through members with an independent counter per pool name.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counters: DashMap<String, AtomicU64>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pool names with a live counter
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }
}

impl SelectionStrategy for RoundRobin {
    fn pick(
        &self,
        name: &str,
        len: usize,
    ) -> usize {
        let len = len.max(1) as u64;
        if let Some(counter) = self.counters.get(name) {
            return (counter.fetch_add(1, Ordering::Relaxed) % len) as usize;
        }
        let counter = self.counters.entry(name.to_string()).or_default();
        (counter.fetch_add(1, Ordering::Relaxed) % len) as usize
    }

    fn forget(
        &self,
        name: &str,
    ) {
        self.counters.remove(name);
    }
}

/// Uniformly random member.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPick;

impl SelectionStrategy for RandomPick {
    fn pick(
        &self,
        _name: &str,
        len: usize,
    ) -> usize {
        rand::thread_rng().gen_range(0..len.max(1))
    }
}
