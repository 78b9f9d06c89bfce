//! In-memory fake backend. Exists for tests: it counts every contract call
//! so runner behaviour (operation counts, key schemes, transaction
//! bracketing, skip semantics) can be asserted without touching disk.

use std::collections::HashMap;

use super::StorageAdapter;
use crate::{BenchError, BenchResult};

#[derive(Debug, Default)]
pub struct MemoryAdapter {
    map: HashMap<Vec<u8>, Vec<u8>>,
    open: bool,
    pub opens: usize,
    pub closes: usize,
    pub writes: usize,
    pub durable_writes: usize,
    pub reads: usize,
    pub hits: usize,
    pub transactions_begun: usize,
    pub transactions_ended: usize,
    pub checkpoints: usize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.map.len()
    }

    /// All stored keys in ascending order.
    pub fn sorted_keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self.map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stored value length for a key, without counting as a read.
    pub fn value_len(&self, key: &[u8]) -> Option<usize> {
        self.map.get(key).map(|v| v.len())
    }

    fn require_open(&self) -> BenchResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BenchError::Storage("memory backend is not open".into()))
        }
    }
}

impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&mut self) -> BenchResult<()> {
        // A fresh instance: previous contents are discarded.
        self.map.clear();
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn begin_transaction(&mut self) -> BenchResult<()> {
        self.require_open()?;
        self.transactions_begun += 1;
        Ok(())
    }

    fn end_transaction(&mut self) -> BenchResult<()> {
        self.require_open()?;
        self.transactions_ended += 1;
        Ok(())
    }

    fn write(&mut self, key: &[u8], value: &[u8], durable: bool) -> BenchResult<()> {
        self.require_open()?;
        self.map.insert(key.to_vec(), value.to_vec());
        self.writes += 1;
        if durable {
            self.durable_writes += 1;
        }
        Ok(())
    }

    fn read(&mut self, key: &[u8]) -> BenchResult<Option<Vec<u8>>> {
        self.require_open()?;
        self.reads += 1;
        let found = self.map.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        Ok(found)
    }

    fn checkpoint(&mut self) -> BenchResult<()> {
        self.require_open()?;
        self.checkpoints += 1;
        Ok(())
    }

    fn close(&mut self) -> BenchResult<()> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }
}
