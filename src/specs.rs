//! Pair trading-rule registry.
//!
//! Holds the minimum size, size step, and price step per pair. Values are
//! kept conservative; an unregistered pair is an explicit configuration
//! error rather than a silent default. Constructed once in `main` and passed
//! by reference; there is no process-wide registry.

use std::collections::HashMap;

use crate::types::{PairSpec, TsumitateError};

/// Registry of per-pair trading rules.
#[derive(Debug, Clone)]
pub struct SpecRegistry {
    table: HashMap<String, PairSpec>,
}

impl SpecRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the bitbank pairs this bot trades today.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.upsert(PairSpec {
            pair: "btc_jpy".to_string(),
            min_size: 0.0001,
            size_step: 0.0001,
            price_step: 1.0,
        });
        reg.upsert(PairSpec {
            pair: "eth_jpy".to_string(),
            min_size: 0.0001,
            size_step: 0.0001,
            price_step: 1.0,
        });
        reg
    }

    /// Look up the rules for a pair. Missing entries are fatal for that
    /// pair's run; callers must not substitute a default.
    pub fn get(&self, pair: &str) -> Result<&PairSpec, TsumitateError> {
        self.table
            .get(pair)
            .ok_or_else(|| TsumitateError::SpecNotFound(pair.to_string()))
    }

    pub fn contains(&self, pair: &str) -> bool {
        self.table.contains_key(pair)
    }

    /// Registered pair names (no defined order).
    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(|k| k.as_str())
    }

    /// Insert or replace a pair's rules.
    pub fn upsert(&mut self, spec: PairSpec) {
        self.table.insert(spec.pair.clone(), spec);
    }

    /// Remove a pair's rules. Absent entries error so operational typos
    /// surface instead of no-opping.
    pub fn remove(&mut self, pair: &str) -> Result<(), TsumitateError> {
        self.table
            .remove(pair)
            .map(|_| ())
            .ok_or_else(|| TsumitateError::SpecNotFound(pair.to_string()))
    }
}

impl Default for SpecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
