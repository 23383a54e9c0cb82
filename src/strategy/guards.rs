//! Order safety guards.
//!
//! An ordered, short-circuiting rule chain over the sizing quote and a
//! fresh volatility sample. The first matching rule decides; a rejection is
//! a normal business outcome carried as a [`GuardDecision`], never an error.

use std::collections::HashMap;

use crate::types::{GuardDecision, Quote, SkipReason};

/// Threshold set for the guard chain.
#[derive(Debug, Clone)]
pub struct GuardParams {
    /// Relative spread limit, e.g. 0.005 = 0.5%.
    pub max_spread_pct: f64,
    /// 5-minute absolute change limit, e.g. 0.03 = 3%.
    pub max_vol5m_pct: f64,
    /// Slippage limit. Checked only when set; estimation is not implemented
    /// yet, so an enabled check passes everything for now.
    pub max_slip_pct: Option<f64>,
    /// Manual full stop.
    pub kill_switch: bool,
}

/// Decide whether one pair may be bought this run.
///
/// Rule order: kill switch, data integrity, spread, volatility, slippage.
pub fn evaluate_pair_guard(quote: &Quote, vol5m_abs: f64, params: &GuardParams) -> GuardDecision {
    // 1) Kill switch overrides everything.
    if params.kill_switch {
        return GuardDecision::reject(SkipReason::Kill, HashMap::new());
    }

    // 2) Data integrity: no usable price, or both book sides dead.
    if quote.price <= 0.0 || (quote.best_bid <= 0.0 && quote.best_ask <= 0.0) {
        let details = HashMap::from([
            ("price".to_string(), quote.price),
            ("best_bid".to_string(), quote.best_bid),
            ("best_ask".to_string(), quote.best_ask),
        ]);
        return GuardDecision::reject(SkipReason::Data, details);
    }

    // 3) Spread.
    if quote.spread_pct > params.max_spread_pct {
        let details = HashMap::from([
            ("spread".to_string(), quote.spread_pct),
            ("limit".to_string(), params.max_spread_pct),
        ]);
        return GuardDecision::reject(SkipReason::Spread, details);
    }

    // 4) 5-minute volatility.
    if vol5m_abs > params.max_vol5m_pct {
        let details = HashMap::from([
            ("vol5m_abs".to_string(), vol5m_abs),
            ("limit".to_string(), params.max_vol5m_pct),
        ]);
        return GuardDecision::reject(SkipReason::Vol, details);
    }

    // 5) Slippage. No estimator exists yet; when one lands it should size
    //    the price impact from book depth against `max_slip_pct`.
    if params.max_slip_pct.is_some() {
        // intentionally passes
    }

    GuardDecision::allow()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_quote(price: f64, bid: f64, ask: f64, spread_pct: f64) -> Quote {
        Quote {
            pair: "btc_jpy".to_string(),
            price,
            best_bid: bid,
            best_ask: ask,
            spread_pct,
            ts_ms: 0,
        }
    }

    fn make_params() -> GuardParams {
        GuardParams {
            max_spread_pct: 0.005,
            max_vol5m_pct: 0.03,
            max_slip_pct: Some(0.008),
            kill_switch: false,
        }
    }

    #[test]
    fn test_kill_switch_rejects_before_anything_else() {
        // Even a quote that would trip every other rule reports KILL.
        let quote = make_quote(0.0, 0.0, 0.0, 9.9);
        let params = GuardParams {
            kill_switch: true,
            ..make_params()
        };
        let d = evaluate_pair_guard(&quote, 9.9, &params);
        assert!(!d.allow);
        assert_eq!(d.reason, Some(SkipReason::Kill));
        assert!(d.details.is_empty());
    }

    #[test]
    fn test_nonpositive_price_rejects_data() {
        let d = evaluate_pair_guard(&make_quote(0.0, 100.0, 101.0, 0.001), 0.0, &make_params());
        assert_eq!(d.reason, Some(SkipReason::Data));
        assert_eq!(d.details["price"], 0.0);
    }

    #[test]
    fn test_dead_book_rejects_data() {
        let d = evaluate_pair_guard(&make_quote(100.0, 0.0, 0.0, 0.0), 0.0, &make_params());
        assert_eq!(d.reason, Some(SkipReason::Data));
    }

    #[test]
    fn test_one_live_side_is_not_a_data_reject() {
        let d = evaluate_pair_guard(&make_quote(100.0, 0.0, 100.0, 0.0), 0.0, &make_params());
        assert!(d.allow);
    }

    #[test]
    fn test_wide_spread_rejects() {
        let d = evaluate_pair_guard(
            &make_quote(100.0, 99.4, 100.0, 0.006),
            0.0,
            &make_params(),
        );
        assert_eq!(d.reason, Some(SkipReason::Spread));
        assert_eq!(d.details["spread"], 0.006);
        assert_eq!(d.details["limit"], 0.005);
    }

    #[test]
    fn test_spread_at_limit_passes() {
        let d = evaluate_pair_guard(
            &make_quote(100.0, 99.5, 100.0, 0.005),
            0.0,
            &make_params(),
        );
        assert!(d.allow);
    }

    #[test]
    fn test_high_volatility_rejects() {
        let d = evaluate_pair_guard(&make_quote(100.0, 99.9, 100.0, 0.001), 0.05, &make_params());
        assert_eq!(d.reason, Some(SkipReason::Vol));
        assert_eq!(d.details["vol5m_abs"], 0.05);
        assert_eq!(d.details["limit"], 0.03);
    }

    #[test]
    fn test_enabled_slippage_check_never_rejects_yet() {
        let params = GuardParams {
            max_slip_pct: Some(0.0), // even a zero limit passes today
            ..make_params()
        };
        let d = evaluate_pair_guard(&make_quote(100.0, 99.9, 100.0, 0.001), 0.0, &params);
        assert!(d.allow);
    }

    #[test]
    fn test_clean_quote_allows_with_empty_details() {
        let d = evaluate_pair_guard(&make_quote(100.0, 99.9, 100.0, 0.001), 0.01, &make_params());
        assert!(d.allow);
        assert!(d.reason.is_none());
        assert!(d.details.is_empty());
    }
}
