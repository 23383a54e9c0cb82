//! Run coordination.
//!
//! One `run()` is one scheduled buy: validate configuration, read the 24h
//! picture for dip detection, allocate the budget, precheck the JPY
//! balance, then walk the pairs strictly in configured order. Allocation
//! remainders and dip top-ups are order-dependent, so pair order is never
//! reshuffled. The run always ends in a [`RunReport`]; only configuration
//! and run-level market/balance failures abort it.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::engine::planner::ExecutionPlanner;
use crate::engine::reporter;
use crate::exchange::{MarketDataPort, TradePort};
use crate::notify::NotifierPort;
use crate::pricing;
use crate::specs::SpecRegistry;
use crate::strategy::allocation::{allocate, apply_dip};
use crate::strategy::dip::dip_flags;
use crate::strategy::guards::GuardParams;
use crate::types::{DipInfo, ExecutionOutcome, RunReport, SkipReason};

/// Drives one scheduled run end to end.
pub struct RunCoordinator<'a> {
    cfg: &'a AppConfig,
    specs: &'a SpecRegistry,
    market: &'a dyn MarketDataPort,
    trade: &'a dyn TradePort,
    notifier: Option<&'a dyn NotifierPort>,
    dry_run: bool,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        cfg: &'a AppConfig,
        specs: &'a SpecRegistry,
        market: &'a dyn MarketDataPort,
        trade: &'a dyn TradePort,
        notifier: Option<&'a dyn NotifierPort>,
        dry_run: bool,
    ) -> Self {
        Self {
            cfg,
            specs,
            market,
            trade,
            notifier,
            dry_run,
        }
    }

    /// Execute one run and push the report. A fatal error still sends a
    /// best-effort abort notice before propagating.
    pub async fn run(&self) -> Result<RunReport> {
        match self.run_inner().await {
            Ok(report) => {
                self.push_text(&reporter::format_report(
                    &report,
                    self.cfg.budget.low_balance_alert_jpy,
                    self.dry_run.then_some("(dry run: no orders placed)"),
                ))
                .await;
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Run aborted");
                self.push_text(&format!("【Bitbank DCA】run aborted: {e}")).await;
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<RunReport> {
        self.cfg.validate()?;
        for w in self.cfg.pair_weights() {
            // Unregistered pairs abort before any market data is touched.
            self.specs.get(&w.pair)?;
        }

        let total = self.cfg.budget.total_jpy;
        info!(
            total_jpy = total,
            pairs = self.cfg.pairs.len(),
            live = self.cfg.trading.live,
            dry_run = self.dry_run,
            "Starting run"
        );

        // 24h snapshot for dip detection. Every pair depends on a coherent
        // picture here, so a fetch failure is fatal to the whole run.
        let mut changes: HashMap<String, f64> = HashMap::new();
        for w in self.cfg.pair_weights() {
            let chg = pricing::change24h_pct(self.market, &w.pair)
                .await
                .with_context(|| format!("24h change fetch failed for {}", w.pair))?;
            changes.insert(w.pair.clone(), chg);
        }

        let fired = dip_flags(&changes, self.cfg.dip.trigger_pct);
        let dip = DipInfo {
            trigger_pct: self.cfg.dip.trigger_pct,
            multiplier: self.cfg.dip.multiplier,
            fired: fired.clone(),
        };

        let base = allocate(self.cfg.pair_weights(), total);
        let adjusted = apply_dip(
            &fired,
            &base,
            total,
            self.cfg.dip.multiplier,
            self.cfg.dip.max_total_jpy,
        );
        let required: i64 = adjusted.iter().map(|a| a.jpy).sum();
        if required != total {
            info!(required, total, fired = ?fired, "Dip reallocation applied");
        }

        let balance_before = self
            .trade
            .free_balance("jpy")
            .await
            .context("free balance fetch failed")?;
        let ts = Utc::now();

        // Balance precheck: short runs skip every pair without touching
        // quotes or guards.
        if balance_before < required {
            warn!(
                balance = balance_before,
                required, "Insufficient JPY, skipping all pairs"
            );
            let details = HashMap::from([
                ("balance".to_string(), balance_before as f64),
                ("required".to_string(), required as f64),
            ]);
            let outcomes: Vec<ExecutionOutcome> = adjusted
                .iter()
                .map(|a| {
                    ExecutionOutcome::skipped(
                        &a.pair,
                        SkipReason::InsuffJpy,
                        a.jpy,
                        0.0,
                        details.clone(),
                    )
                })
                .collect();
            return Ok(RunReport {
                ts,
                total_jpy: total,
                adjusted_total_jpy: required,
                outcomes,
                dip,
                balance_before_jpy: balance_before,
                balance_after_jpy: balance_before,
            });
        }

        let guard_params = GuardParams {
            max_spread_pct: self.cfg.guards.max_spread_pct,
            max_vol5m_pct: self.cfg.guards.max_vol5m_pct,
            max_slip_pct: self.cfg.guards.max_slip_pct,
            kill_switch: self.cfg.guards.kill_switch,
        };
        let planner = ExecutionPlanner::new(
            self.market,
            self.trade,
            self.specs,
            guard_params,
            self.cfg.trading.live,
            self.dry_run,
        );

        let mut outcomes = Vec::with_capacity(adjusted.len());
        for a in &adjusted {
            let chg = changes.get(&a.pair).copied().unwrap_or(0.0);
            let outcome = planner.run_pair(&a.pair, a.jpy, chg).await;
            info!(outcome = %outcome, "Pair complete");
            outcomes.push(outcome);
        }

        // Post-run balance is informational; reuse the precheck reading if
        // the venue hiccups now.
        let balance_after = match self.trade.free_balance("jpy").await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Post-run balance fetch failed");
                balance_before
            }
        };

        let stats = reporter::summarize(&outcomes);
        info!(
            filled = stats.filled,
            skipped = stats.skipped,
            errors = stats.errors,
            filled_jpy = stats.filled_jpy_planned,
            "Run complete"
        );

        Ok(RunReport {
            ts,
            total_jpy: total,
            adjusted_total_jpy: required,
            outcomes,
            dip,
            balance_before_jpy: balance_before,
            balance_after_jpy: balance_after,
        })
    }

    async fn push_text(&self, text: &str) {
        if let Some(notifier) = self.notifier {
            if let Err(e) = notifier.send(text).await {
                warn!(error = %e, "Notification failed");
            }
        }
    }
}
