//! In-memory mocks for end-to-end run tests.
//!
//! Provides deterministic `MarketDataPort` / `TradePort` / `NotifierPort`
//! implementations that serve bitbank-shaped payloads, accept orders, and
//! record everything, all in-memory with no external dependencies.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use tsumitate::config::{
    AppConfig, BudgetConfig, DipConfig, ExchangeConfig, GuardsConfig, NotifyConfig, TradingConfig,
};
use tsumitate::exchange::{MarketDataPort, OrderResult, TradePort};
use tsumitate::notify::NotifierPort;
use tsumitate::types::PairWeight;

// ---------------------------------------------------------------------------
// Market data mock
// ---------------------------------------------------------------------------

/// Per-pair market snapshot the mock serves.
#[derive(Debug, Clone)]
pub struct MockPairMarket {
    pub best_bid: f64,
    pub best_ask: f64,
    /// 24h open/last for the ticker.
    pub open: f64,
    pub last: f64,
    /// 5-minute closes, oldest first. Served for any requested date.
    pub closes: Vec<f64>,
}

impl MockPairMarket {
    /// A calm market around `price`: tight book, flat candles, flat 24h.
    pub fn quiet(price: f64) -> Self {
        Self {
            best_bid: price * 0.9999,
            best_ask: price,
            open: price,
            last: price,
            closes: vec![price, price],
        }
    }
}

/// Deterministic market-data port with per-pair failure switches.
pub struct MockMarket {
    pairs: Mutex<HashMap<String, MockPairMarket>>,
    fail_depth: Mutex<HashSet<String>>,
    fail_candles: Mutex<HashSet<String>>,
    fail_ticker: Mutex<HashSet<String>>,
    depth_calls: Mutex<usize>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self {
            pairs: Mutex::new(HashMap::new()),
            fail_depth: Mutex::new(HashSet::new()),
            fail_candles: Mutex::new(HashSet::new()),
            fail_ticker: Mutex::new(HashSet::new()),
            depth_calls: Mutex::new(0),
        }
    }

    pub fn set_pair(&self, pair: &str, market: MockPairMarket) {
        self.pairs.lock().unwrap().insert(pair.to_string(), market);
    }

    pub fn fail_depth_for(&self, pair: &str) {
        self.fail_depth.lock().unwrap().insert(pair.to_string());
    }

    pub fn fail_candles_for(&self, pair: &str) {
        self.fail_candles.lock().unwrap().insert(pair.to_string());
    }

    pub fn fail_ticker_for(&self, pair: &str) {
        self.fail_ticker.lock().unwrap().insert(pair.to_string());
    }

    pub fn depth_calls(&self) -> usize {
        *self.depth_calls.lock().unwrap()
    }

    fn pair(&self, pair: &str) -> Result<MockPairMarket> {
        self.pairs
            .lock()
            .unwrap()
            .get(pair)
            .cloned()
            .ok_or_else(|| anyhow!("mock has no market for {pair}"))
    }
}

#[async_trait]
impl MarketDataPort for MockMarket {
    async fn ticker(&self, pair: &str) -> Result<Value> {
        if self.fail_ticker.lock().unwrap().contains(pair) {
            return Err(anyhow!("mock ticker failure for {pair}"));
        }
        let m = self.pair(pair)?;
        Ok(json!({
            "success": 1,
            "data": {
                "buy": m.best_bid.to_string(),
                "sell": m.best_ask.to_string(),
                "open": m.open.to_string(),
                "last": m.last.to_string(),
                "timestamp": 1_700_000_000_000_i64,
            }
        }))
    }

    async fn depth(&self, pair: &str) -> Result<Value> {
        *self.depth_calls.lock().unwrap() += 1;
        if self.fail_depth.lock().unwrap().contains(pair) {
            return Err(anyhow!("mock depth failure for {pair}"));
        }
        let m = self.pair(pair)?;
        Ok(json!({
            "success": 1,
            "data": {
                "bids": [[m.best_bid.to_string(), "1.0"]],
                "asks": [[m.best_ask.to_string(), "1.0"]],
                "timestamp": 1_700_000_000_000_i64,
            }
        }))
    }

    async fn candlestick(&self, pair: &str, candle_type: &str, _yyyymmdd: &str) -> Result<Value> {
        if self.fail_candles.lock().unwrap().contains(pair) {
            return Err(anyhow!("mock candlestick failure for {pair}"));
        }
        let m = self.pair(pair)?;
        let ohlcv: Vec<Value> = m
            .closes
            .iter()
            .map(|c| {
                json!([
                    c.to_string(),
                    c.to_string(),
                    c.to_string(),
                    c.to_string(),
                    "1.0",
                    0
                ])
            })
            .collect();
        Ok(json!({
            "success": 1,
            "data": { "candlestick": [ { "type": candle_type, "ohlcv": ohlcv } ] }
        }))
    }
}

// ---------------------------------------------------------------------------
// Trade mock
// ---------------------------------------------------------------------------

/// In-memory trade port: tracks a JPY balance and every order placed.
pub struct MockTrade {
    balance_jpy: Mutex<i64>,
    orders: Mutex<Vec<(String, f64)>>,
    fill_prices: Mutex<HashMap<String, f64>>,
    fail_orders: Mutex<bool>,
    fail_balance: Mutex<bool>,
}

impl MockTrade {
    pub fn new(balance_jpy: i64) -> Self {
        Self {
            balance_jpy: Mutex::new(balance_jpy),
            orders: Mutex::new(Vec::new()),
            fill_prices: Mutex::new(HashMap::new()),
            fail_orders: Mutex::new(false),
            fail_balance: Mutex::new(false),
        }
    }

    /// Price at which orders for `pair` fill.
    pub fn set_fill_price(&self, pair: &str, price: f64) {
        self.fill_prices
            .lock()
            .unwrap()
            .insert(pair.to_string(), price);
    }

    pub fn fail_orders(&self) {
        *self.fail_orders.lock().unwrap() = true;
    }

    pub fn fail_balance(&self) {
        *self.fail_balance.lock().unwrap() = true;
    }

    pub fn orders(&self) -> Vec<(String, f64)> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradePort for MockTrade {
    async fn free_balance(&self, _asset: &str) -> Result<i64> {
        if *self.fail_balance.lock().unwrap() {
            return Err(anyhow!("mock balance failure"));
        }
        Ok(*self.balance_jpy.lock().unwrap())
    }

    async fn market_buy(&self, pair: &str, quantity: f64) -> Result<OrderResult> {
        if *self.fail_orders.lock().unwrap() {
            return Err(anyhow!("mock order failure"));
        }
        let price = self
            .fill_prices
            .lock()
            .unwrap()
            .get(pair)
            .copied()
            .unwrap_or(0.0);

        let mut orders = self.orders.lock().unwrap();
        orders.push((pair.to_string(), quantity));
        let order_id = format!("MOCK-{}", orders.len());

        *self.balance_jpy.lock().unwrap() -= (quantity * price) as i64;

        Ok(OrderResult {
            order_id: Some(order_id),
            avg_price: price,
            filled_qty: quantity,
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier mock
// ---------------------------------------------------------------------------

/// Records every message a run pushes.
pub struct MockNotifier {
    messages: Mutex<Vec<String>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPort for MockNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config builder
// ---------------------------------------------------------------------------

/// A config mirroring the shipped example: 10,000 JPY over btc 0.7 /
/// eth 0.3, standard guards, dip x1.5 capped at 15,000.
pub fn make_config(live: bool) -> AppConfig {
    AppConfig {
        budget: BudgetConfig {
            total_jpy: 10_000,
            low_balance_alert_jpy: 20_000,
        },
        pairs: vec![
            PairWeight::new("btc_jpy", 0.7),
            PairWeight::new("eth_jpy", 0.3),
        ],
        guards: GuardsConfig {
            max_spread_pct: 0.005,
            max_vol5m_pct: 0.03,
            max_slip_pct: Some(0.008),
            kill_switch: false,
        },
        dip: DipConfig {
            trigger_pct: -0.03,
            multiplier: 1.5,
            max_total_jpy: 15_000,
        },
        trading: TradingConfig { live },
        exchange: ExchangeConfig {
            api_key_env: "BITBANK_API_KEY".to_string(),
            api_secret_env: "BITBANK_API_SECRET".to_string(),
        },
        notify: NotifyConfig {
            channel_token_env: None,
            to_user_id_env: None,
        },
    }
}
