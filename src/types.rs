//! Shared types for the TSUMITATE buyer.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that exchange, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Configuration-level entities
// ---------------------------------------------------------------------------

/// One target pair and its budget weight.
///
/// Weights need not sum to 1.0; the allocator normalizes over the whole
/// slice. Slice order is the canonical pair order for the entire run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairWeight {
    pub pair: String,
    pub weight: f64,
}

impl PairWeight {
    pub fn new(pair: &str, weight: f64) -> Self {
        Self {
            pair: pair.to_string(),
            weight,
        }
    }
}

/// Exchange trading rules for one pair: minimum order size and quantization
/// steps. Looked up from the [`crate::specs::SpecRegistry`]; a missing entry
/// is a configuration error, not a skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSpec {
    pub pair: String,
    /// Orders below this quantity are unfillable.
    pub min_size: f64,
    /// Quantity granularity above `min_size`.
    pub size_step: f64,
    /// Price granularity (unused for market orders, kept for display).
    pub price_step: f64,
}

/// JPY allocated to one pair. Ordered `Vec<PairAllocation>` preserves the
/// canonical pair order that remainder assignment depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAllocation {
    pub pair: String,
    pub jpy: i64,
}

impl PairAllocation {
    pub fn new(pair: &str, jpy: i64) -> Self {
        Self {
            pair: pair.to_string(),
            jpy,
        }
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Reference price for quantity calculation. `price` is the best ask when
/// one is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub pair: String,
    /// Reference price used for sizing (best ask, or last trade on fallback).
    pub price: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    /// `(ask - bid) / mid`; 0.0 when either side is non-positive.
    pub spread_pct: f64,
    /// Exchange timestamp in milliseconds.
    pub ts_ms: i64,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ask={:.0} bid={:.0} spread={:.3}%",
            self.pair,
            self.best_ask,
            self.best_bid,
            self.spread_pct * 100.0,
        )
    }
}

/// Dip reallocation summary carried into the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DipInfo {
    /// Configured trigger, e.g. -0.03 for "-3% over 24h".
    pub trigger_pct: f64,
    pub multiplier: f64,
    /// Per-pair dip flags for this run.
    pub fired: HashMap<String, bool>,
}

impl DipInfo {
    /// Whether any pair fired this run.
    pub fn any_fired(&self) -> bool {
        self.fired.values().any(|f| *f)
    }
}

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

/// Closed set of reasons a pair (or the whole run) is not bought.
///
/// These are expected business outcomes, never errors. `LiveDisabled` is a
/// run-level safety gate rather than a guard verdict, but it lives in the
/// same enum so every skip renders through one code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Manual kill switch is on.
    Kill,
    /// Unusable market data (non-positive price or empty book).
    Data,
    /// Spread above the configured limit.
    Spread,
    /// 5-minute volatility above the configured limit.
    Vol,
    /// Estimated slippage above the configured limit (extension point).
    Slip,
    /// Rounded quantity below the exchange minimum.
    MinSize,
    /// Free JPY below the run's total allocation (whole run skipped).
    InsuffJpy,
    /// Live trading gate is off.
    LiveDisabled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            SkipReason::Kill => "KILL",
            SkipReason::Data => "DATA",
            SkipReason::Spread => "SPREAD",
            SkipReason::Vol => "VOL",
            SkipReason::Slip => "SLIP",
            SkipReason::MinSize => "MIN_SIZE",
            SkipReason::InsuffJpy => "INSUFF_JPY",
            SkipReason::LiveDisabled => "LIVE_DISABLED",
        };
        write!(f, "{code}")
    }
}

// ---------------------------------------------------------------------------
// Guard decision
// ---------------------------------------------------------------------------

/// Outcome of the guard chain for one pair. When `allow` is false, `reason`
/// carries the first rule that matched and `details` the thresholds and
/// measured values behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardDecision {
    pub allow: bool,
    pub reason: Option<SkipReason>,
    pub details: HashMap<String, f64>,
}

impl GuardDecision {
    /// Passing decision with no detail.
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
            details: HashMap::new(),
        }
    }

    /// Rejecting decision with the matched rule and its numeric context.
    pub fn reject(reason: SkipReason, details: HashMap<String, f64>) -> Self {
        Self {
            allow: false,
            reason: Some(reason),
            details,
        }
    }
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(r) => write!(f, "reject:{r}"),
            None => write!(f, "allow"),
        }
    }
}

// ---------------------------------------------------------------------------
// Plan & outcome
// ---------------------------------------------------------------------------

/// Pre-order plan for one pair: pure calculation, no trading I/O.
/// Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlan {
    pub pair: String,
    /// JPY allocated to this pair (after dip adjustment).
    pub jpy_alloc: i64,
    pub quote: Quote,
    /// `jpy_alloc / quote.price` before rounding; 0.0 when price <= 0.
    pub raw_qty: f64,
    /// Quantity after min-size/step rounding; 0.0 means unfillable.
    pub qty: f64,
}

/// Terminal status of one pair within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Filled,
    Skipped,
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Filled => write!(f, "FILLED"),
            OutcomeStatus::Skipped => write!(f, "SKIPPED"),
            OutcomeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Final result for one pair, built from the plan plus the guard decision
/// and (if an order went out) the trade port's normalized fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub pair: String,
    pub status: OutcomeStatus,
    pub reason: Option<SkipReason>,
    /// JPY planned for this pair (allocation after dip adjustment).
    pub jpy_planned: i64,
    /// Reference price the quantity was sized against.
    pub quote_price: f64,
    /// Average fill price; only present on FILLED.
    pub avg_price: Option<f64>,
    /// Filled quantity; 0.0 unless FILLED.
    pub filled_qty: f64,
    /// Numeric context (spread, vol, thresholds…) for observability.
    pub details: HashMap<String, f64>,
}

impl ExecutionOutcome {
    pub fn filled(
        pair: &str,
        jpy_planned: i64,
        quote_price: f64,
        avg_price: f64,
        filled_qty: f64,
        details: HashMap<String, f64>,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            status: OutcomeStatus::Filled,
            reason: None,
            jpy_planned,
            quote_price,
            avg_price: Some(avg_price),
            filled_qty,
            details,
        }
    }

    pub fn skipped(
        pair: &str,
        reason: SkipReason,
        jpy_planned: i64,
        quote_price: f64,
        details: HashMap<String, f64>,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            status: OutcomeStatus::Skipped,
            reason: Some(reason),
            jpy_planned,
            quote_price,
            avg_price: None,
            filled_qty: 0.0,
            details,
        }
    }

    pub fn error(pair: &str, jpy_planned: i64, quote_price: f64) -> Self {
        Self {
            pair: pair.to_string(),
            status: OutcomeStatus::Error,
            reason: None,
            jpy_planned,
            quote_price,
            avg_price: None,
            filled_qty: 0.0,
            details: HashMap::new(),
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            OutcomeStatus::Filled => write!(
                f,
                "{} FILLED qty={:.8} avg={:.0} ({}円)",
                self.pair,
                self.filled_qty,
                self.avg_price.unwrap_or(0.0),
                self.jpy_planned,
            ),
            OutcomeStatus::Skipped => write!(
                f,
                "{} SKIPPED {} ({}円)",
                self.pair,
                self.reason.map(|r| r.to_string()).unwrap_or_default(),
                self.jpy_planned,
            ),
            OutcomeStatus::Error => write!(f, "{} ERROR ({}円)", self.pair, self.jpy_planned),
        }
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Aggregate of one scheduled run, handed to the notifier. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub ts: DateTime<Utc>,
    /// Base budget before dip adjustment.
    pub total_jpy: i64,
    /// Total after dip adjustment (equals `total_jpy` when no dip fired).
    pub adjusted_total_jpy: i64,
    pub outcomes: Vec<ExecutionOutcome>,
    pub dip: DipInfo,
    pub balance_before_jpy: i64,
    pub balance_after_jpy: i64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal domain errors. Expected business outcomes (guard rejections,
/// min-size skips, insufficient balance) are represented as values above and
/// never pass through here.
#[derive(Debug, thiserror::Error)]
pub enum TsumitateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("PairSpec not found for '{0}'")]
    SpecNotFound(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
