//! history.rs: bounded in-memory log of recent strategy runs for `/debug/history`.

use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::agent::StrategyResponse;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub ts_unix: u64,
    pub success_prob: f64,
    pub trend_available: bool,
    pub primary: String,
    pub budget: u64,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    /// `budget` is the normalized request budget, not the allocated sum.
    pub fn push(&self, resp: &StrategyResponse, budget: u64) {
        let entry = HistoryEntry {
            ts_unix: now_unix(),
            success_prob: resp.success_prob,
            trend_available: resp.trend.is_some(),
            primary: resp.allocation.primary.clone(),
            budget,
        };

        let mut v = self.lock();
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.lock();
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are plain data; a panic mid-push cannot leave them inconsistent.
    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
