//! Per-pair execution planning.
//!
//! Builds the order plan for one pair (quote → raw quantity → rounded
//! quantity) and walks it through the gates: minimum size, guard chain,
//! live-trading switch, then the trade port. Every path ends in an
//! [`ExecutionOutcome`]; infrastructure failures become ERROR outcomes and
//! never escape past this module, so one bad pair cannot sink the run.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use crate::exchange::{MarketDataPort, OrderResult, TradePort};
use crate::pricing;
use crate::specs::SpecRegistry;
use crate::strategy::guards::{evaluate_pair_guard, GuardParams};
use crate::strategy::rounding::round_qty_down;
use crate::types::{ExecutionOutcome, OrderPlan, SkipReason};

/// Plans and executes one pair at a time.
pub struct ExecutionPlanner<'a> {
    market: &'a dyn MarketDataPort,
    trade: &'a dyn TradePort,
    specs: &'a SpecRegistry,
    guard_params: GuardParams,
    /// Real orders only when true; otherwise pairs end in LIVE_DISABLED.
    live: bool,
    /// Synthesize fills instead of calling the trade port.
    dry_run: bool,
}

impl<'a> ExecutionPlanner<'a> {
    pub fn new(
        market: &'a dyn MarketDataPort,
        trade: &'a dyn TradePort,
        specs: &'a SpecRegistry,
        guard_params: GuardParams,
        live: bool,
        dry_run: bool,
    ) -> Self {
        Self {
            market,
            trade,
            specs,
            guard_params,
            live,
            dry_run,
        }
    }

    /// Quote, size, and round one pair. Pure calculation plus market-data
    /// reads, no trading I/O.
    pub async fn build_plan(&self, pair: &str, jpy_alloc: i64) -> Result<OrderPlan> {
        let spec = self.specs.get(pair)?;
        let quote = pricing::resolve_quote(self.market, pair).await?;
        let raw_qty = if quote.price > 0.0 {
            jpy_alloc as f64 / quote.price
        } else {
            0.0
        };
        let qty = round_qty_down(spec, raw_qty);
        Ok(OrderPlan {
            pair: pair.to_string(),
            jpy_alloc,
            quote,
            raw_qty,
            qty,
        })
    }

    /// Run one pair end to end. Never returns an error: quote or order
    /// failures surface as an ERROR outcome for this pair only.
    pub async fn run_pair(&self, pair: &str, jpy_alloc: i64, chg24h_pct: f64) -> ExecutionOutcome {
        let plan = match self.build_plan(pair, jpy_alloc).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(pair, error = %e, "Plan build failed");
                return ExecutionOutcome::error(pair, jpy_alloc, 0.0);
            }
        };
        self.execute_plan(&plan, chg24h_pct).await
    }

    /// Walk a built plan through the gates and (maybe) the trade port.
    pub async fn execute_plan(&self, plan: &OrderPlan, chg24h_pct: f64) -> ExecutionOutcome {
        let pair = plan.pair.as_str();

        let spec = match self.specs.get(pair) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(pair, error = %e, "Spec lookup failed mid-run");
                return ExecutionOutcome::error(pair, plan.jpy_alloc, plan.quote.price);
            }
        };

        // Unfillable quantity skips before any guard work.
        if plan.qty <= 0.0 || plan.qty < spec.min_size {
            info!(
                pair,
                raw_qty = plan.raw_qty,
                min_size = spec.min_size,
                "Quantity below minimum, skipping"
            );
            let details = HashMap::from([
                ("min_size".to_string(), spec.min_size),
                ("size_step".to_string(), spec.size_step),
                ("price_step".to_string(), spec.price_step),
            ]);
            return ExecutionOutcome::skipped(
                pair,
                SkipReason::MinSize,
                plan.jpy_alloc,
                plan.quote.price,
                details,
            );
        }

        // Fresh volatility sample for the guard chain.
        let vol5m_abs = match pricing::vol5m_pct(self.market, pair).await {
            Ok(v) => v,
            Err(e) => {
                warn!(pair, error = %e, "Volatility fetch failed");
                return ExecutionOutcome::error(pair, plan.jpy_alloc, plan.quote.price);
            }
        };

        let decision = evaluate_pair_guard(&plan.quote, vol5m_abs, &self.guard_params);
        if !decision.allow {
            info!(pair, decision = %decision, "Guard rejected");
            let mut details = decision.details.clone();
            details.insert("spread".to_string(), plan.quote.spread_pct);
            details.insert("vol5m_abs".to_string(), vol5m_abs);
            details.insert("chg24h_pct".to_string(), chg24h_pct);
            return ExecutionOutcome::skipped(
                pair,
                decision.reason.unwrap_or(SkipReason::Data),
                plan.jpy_alloc,
                plan.quote.price,
                details,
            );
        }

        let mut details = HashMap::from([
            ("spread".to_string(), plan.quote.spread_pct),
            ("vol5m_abs".to_string(), vol5m_abs),
            ("chg24h_pct".to_string(), chg24h_pct),
        ]);

        // Dry-run reports the fill it would have asked for, without touching
        // the trade port (and regardless of the live switch).
        if self.dry_run {
            let synthetic = OrderResult {
                order_id: Some(format!("dry-run-{}", Uuid::new_v4())),
                avg_price: plan.quote.price,
                filled_qty: plan.qty,
            };
            info!(
                pair,
                qty = plan.qty,
                order_id = ?synthetic.order_id,
                "[DRY RUN] Would place market buy"
            );
            return ExecutionOutcome::filled(
                pair,
                plan.jpy_alloc,
                plan.quote.price,
                synthetic.avg_price,
                synthetic.filled_qty,
                details,
            );
        }

        // Live switch is the last gate before real money moves.
        if !self.live {
            info!(pair, "Live trading disabled, skipping order");
            return ExecutionOutcome::skipped(
                pair,
                SkipReason::LiveDisabled,
                plan.jpy_alloc,
                plan.quote.price,
                details,
            );
        }

        match self.trade.market_buy(pair, plan.qty).await {
            Ok(result) => {
                info!(
                    pair,
                    order_id = ?result.order_id,
                    avg_price = result.avg_price,
                    filled_qty = result.filled_qty,
                    "Order filled"
                );
                details.insert("ordered_qty".to_string(), plan.qty);
                ExecutionOutcome::filled(
                    pair,
                    plan.jpy_alloc,
                    plan.quote.price,
                    result.avg_price,
                    result.filled_qty,
                    details,
                )
            }
            Err(e) => {
                warn!(pair, error = %e, "Order placement failed");
                ExecutionOutcome::error(pair, plan.jpy_alloc, plan.quote.price)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
