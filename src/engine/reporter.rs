//! Run report rendering.
//!
//! Assembles the notification text for one run and the summary counters
//! used in logs and tests. Amounts are yen with thousands separators;
//! spread and volatility arrive as fractions and render as percentages;
//! the 24h change is already a percentage.

use chrono::{DateTime, FixedOffset, Utc};

use crate::types::{ExecutionOutcome, OutcomeStatus, RunReport, SkipReason};

const TITLE: &str = "Bitbank DCA";

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("JST offset is in range")
}

fn fmt_jst(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&jst()).format("%Y-%m-%d %H:%M").to_string()
}

fn fmt_money(jpy: i64) -> String {
    let digits = jpy.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if jpy < 0 {
        format!("-{grouped}円")
    } else {
        format!("{grouped}円")
    }
}

/// Fractional value as a percentage, "-" when absent.
fn fmt_pct(x: Option<f64>) -> String {
    match x {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "-".to_string(),
    }
}

fn status_emoji(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Filled => "✅",
        OutcomeStatus::Skipped => "⏸️",
        OutcomeStatus::Error => "⚠️",
    }
}

fn reason_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Kill => "kill switch",
        SkipReason::Data => "bad market data",
        SkipReason::Spread => "spread limit exceeded",
        SkipReason::Vol => "5m volatility limit exceeded",
        SkipReason::Slip => "slippage limit exceeded",
        SkipReason::MinSize => "below minimum order size",
        SkipReason::InsuffJpy => "insufficient JPY balance",
        SkipReason::LiveDisabled => "live trading disabled",
    }
}

fn pair_block(o: &ExecutionOutcome) -> String {
    let head = format!("{} {}", status_emoji(o.status), o.pair);
    let alloc = format!("alloc: {}", fmt_money(o.jpy_planned));
    let quote = format!("quote: {}", fmt_money(o.quote_price as i64));
    let spread = format!("spread: {}", fmt_pct(o.details.get("spread").copied()));
    let vol = format!("5m: {}", fmt_pct(o.details.get("vol5m_abs").copied()));
    let chg24 = o
        .details
        .get("chg24h_pct")
        .map(|c| format!(" / 24h: {c:+.2}%"))
        .unwrap_or_default();

    match o.status {
        OutcomeStatus::Filled => {
            let avg = match o.avg_price {
                Some(p) if p > 0.0 => format!("avg: {}", fmt_money(p as i64)),
                _ => "avg: -".to_string(),
            };
            let qty = format!("qty: {:.8}", o.filled_qty);
            format!("{head}\n  {alloc} / {quote} / {avg}\n  {qty} / {spread} / {vol}{chg24}")
        }
        OutcomeStatus::Skipped => {
            let label = o.reason.map(reason_label).unwrap_or("-");
            format!("{head}\n  SKIP: {label}\n  {alloc} / {quote} / {spread} / {vol}{chg24}")
        }
        OutcomeStatus::Error => {
            format!("{head}\n  ERROR\n  {alloc} / {quote}")
        }
    }
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Build the notification text for one run report.
pub fn format_report(
    report: &RunReport,
    low_balance_alert_jpy: i64,
    extra_note: Option<&str>,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    let mut head = format!(
        "【{TITLE}】{} / budget: {}",
        fmt_jst(report.ts),
        fmt_money(report.total_jpy),
    );
    if report.dip.any_fired() {
        head.push_str(&format!(" / dip×{:.2}", report.dip.multiplier));
    }
    lines.push(head);

    if report.outcomes.is_empty() {
        lines.push("(no pairs configured)".to_string());
    }
    for o in &report.outcomes {
        lines.push(pair_block(o));
    }

    let mut balance_line = format!("JPY balance: {}", fmt_money(report.balance_after_jpy));
    if report.balance_after_jpy < low_balance_alert_jpy {
        balance_line = format!(
            "⚠️ {balance_line} (below {})",
            fmt_money(low_balance_alert_jpy)
        );
    }
    lines.push(balance_line);

    if let Some(note) = extra_note {
        lines.push(note.to_string());
    }

    lines.join("\n")
}

/// Per-status counters for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub filled: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Planned JPY over filled pairs only.
    pub filled_jpy_planned: i64,
    /// Executed quantity over filled pairs only.
    pub filled_qty_sum: f64,
}

pub fn summarize(outcomes: &[ExecutionOutcome]) -> RunStats {
    let mut stats = RunStats::default();
    for o in outcomes {
        match o.status {
            OutcomeStatus::Filled => {
                stats.filled += 1;
                stats.filled_jpy_planned += o.jpy_planned;
                stats.filled_qty_sum += o.filled_qty;
            }
            OutcomeStatus::Skipped => stats.skipped += 1,
            OutcomeStatus::Error => stats.errors += 1,
        }
    }
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
