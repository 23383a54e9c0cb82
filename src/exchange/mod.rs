//! Exchange integrations.
//!
//! Defines the market-data and trading port traits and provides the bitbank
//! REST implementations. Ports return exchange-native JSON (`serde_json::Value`)
//! for market data (parsing stays with the callers in `pricing`), while the
//! trade port normalizes order responses into [`OrderResult`] before they
//! cross back into the engine.

pub mod bitbank_private;
pub mod bitbank_public;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

/// Normalized fill summary returned by [`TradePort::market_buy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: Option<String>,
    /// Average fill price; 0.0 when the venue reported none.
    pub avg_price: f64,
    /// Executed base-currency quantity.
    pub filled_qty: f64,
}

/// Read-only market data access.
///
/// Implementors return the venue's raw JSON payloads; callers own the
/// parsing contract so that a venue change stays contained here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// 24h ticker snapshot for a pair.
    async fn ticker(&self, pair: &str) -> Result<Value>;

    /// Order book depth for a pair.
    async fn depth(&self, pair: &str) -> Result<Value>;

    /// Candlestick data for one exchange-local calendar day.
    /// `candle_type` is the venue's interval name, e.g. "5min".
    async fn candlestick(&self, pair: &str, candle_type: &str, yyyymmdd: &str) -> Result<Value>;
}

/// Authenticated trading and balance access.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradePort: Send + Sync {
    /// Free (uncommitted) balance of an asset, floored to the minor unit.
    async fn free_balance(&self, asset: &str) -> Result<i64>;

    /// Place a market buy and return the normalized fill.
    async fn market_buy(&self, pair: &str, quantity: f64) -> Result<OrderResult>;
}
