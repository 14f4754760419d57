//! # engine::history
//!
//! **PriceHistoryBuffer** — bounded per-symbol FIFO of recent prices.
//!
//! Each symbol owns its own `VecDeque` inside a sharded `DashMap`, so ticks
//! for different symbols never contend on one lock. Readers get an owned
//! copy via [`PriceHistoryBuffer::snapshot`] and never observe a buffer
//! mid-append.

use std::collections::VecDeque;

use dashmap::DashMap;

pub struct PriceHistoryBuffer {
    capacity: usize,
    buffers:  DashMap<String, VecDeque<f64>>,
}

impl PriceHistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers:  DashMap::new(),
        }
    }

    /// Push `price` for `symbol`, evicting the oldest entry when full.
    /// Returns the buffer length after the append.
    pub fn append(&self, symbol: &str, price: f64) -> usize {
        let mut entry = self
            .buffers
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        if entry.len() >= self.capacity {
            entry.pop_front();
        }
        entry.push_back(price);
        entry.len()
    }

    /// Immutable copy of the current sequence, oldest first.
    pub fn snapshot(&self, symbol: &str) -> Vec<f64> {
        self.buffers
            .get(symbol)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recent price, if `symbol` has been appended to.
    pub fn latest(&self, symbol: &str) -> Option<f64> {
        self.buffers.get(symbol).and_then(|b| b.back().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.buffers.get(symbol).map_or(0, |b| b.len())
    }

    /// Symbols with at least one buffered price, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.buffers.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }
}
