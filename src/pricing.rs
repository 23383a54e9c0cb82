//! Market data interpretation.
//!
//! Turns the venue's raw JSON into the numbers the run needs: a sizing
//! quote (order-book best levels with a ticker fallback), short-window
//! realized volatility from 5-minute closes, and the 24h change used for
//! dip detection. bitbank encodes most numerics as strings; all parsing
//! here is lenient about string-vs-number.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::Value;
use tracing::debug;

use crate::exchange::MarketDataPort;
use crate::types::Quote;

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("JST offset is in range")
}

/// Exchange-local (JST) calendar day as "YYYYMMDD".
fn yyyymmdd_jst(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&jst()).format("%Y%m%d").to_string()
}

/// Numeric field that may arrive as a JSON number or a decimal string.
fn num(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Relative spread `(ask - bid) / mid`; 0.0 when either side is
/// non-positive.
fn spread_pct(bid: f64, ask: f64) -> f64 {
    if bid <= 0.0 || ask <= 0.0 {
        return 0.0;
    }
    let mid = (bid + ask) / 2.0;
    if mid > 0.0 {
        (ask - bid) / mid
    } else {
        0.0
    }
}

/// Best bid and ask from a depth response; 0.0 for an empty side.
fn parse_depth_best(depth: &Value) -> (f64, f64) {
    let best = |side: &str| {
        depth
            .pointer(&format!("/data/{side}/0/0"))
            .map(num)
            .unwrap_or(0.0)
    };
    (best("bids"), best("asks"))
}

/// Best bid, best ask, last price, and timestamp from a ticker response.
/// bitbank has used both `buy`/`sell` and `best_bid`/`best_ask`; `last` is
/// the final fallback for either side.
fn parse_ticker_best(ticker: &Value) -> (f64, f64, f64, i64) {
    let data = ticker.get("data").cloned().unwrap_or(Value::Null);
    // First *present* key wins, mirroring the venue's historical field names.
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| data.get(*n))
            .map(num)
            .unwrap_or(0.0)
    };
    let best_bid = field(&["buy", "best_bid", "last"]);
    let best_ask = field(&["sell", "best_ask", "last"]);
    let last = data.get("last").map(num).unwrap_or(0.0);
    let ts = data
        .get("timestamp")
        .map(|v| num(v) as i64)
        .unwrap_or(0);
    (best_bid, best_ask, last, ts)
}

/// The last two closes, in chronological order, from a candlestick
/// response. Fewer than two candles yields a shorter vec.
fn latest_two_closes(candles: &Value) -> Vec<f64> {
    let ohlcv = candles
        .pointer("/data/candlestick/0/ohlcv")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let closes: Vec<f64> = ohlcv
        .iter()
        .filter_map(|row| row.as_array())
        .filter(|row| row.len() >= 4)
        .map(|row| num(&row[3]))
        .collect();

    let start = closes.len().saturating_sub(2);
    closes[start..].to_vec()
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Resolve the sizing quote for a pair.
///
/// Order-book best levels win when both sides are live; otherwise the
/// ticker snapshot is used, with the last trade standing in for a missing
/// ask. This only fails when the ticker itself is unreachable; a zero
/// price or one-sided book is returned as-is and rejected later by the
/// guard chain, not here.
pub async fn resolve_quote(md: &dyn MarketDataPort, pair: &str) -> Result<Quote> {
    match md.depth(pair).await {
        Ok(dj) => {
            let (best_bid, best_ask) = parse_depth_best(&dj);
            if best_bid > 0.0 && best_ask > 0.0 {
                let ts_ms = dj
                    .pointer("/data/timestamp")
                    .map(|v| num(v) as i64)
                    .unwrap_or(0);
                return Ok(Quote {
                    pair: pair.to_string(),
                    price: best_ask,
                    best_bid,
                    best_ask,
                    spread_pct: spread_pct(best_bid, best_ask),
                    ts_ms,
                });
            }
            debug!(pair, "depth unusable, falling back to ticker");
        }
        Err(e) => {
            debug!(pair, error = %e, "depth fetch failed, falling back to ticker");
        }
    }

    let tj = md.ticker(pair).await?;
    let (best_bid, best_ask, last, ts_ms) = parse_ticker_best(&tj);
    let price = if best_ask > 0.0 { best_ask } else { last };
    let sp = if best_bid > 0.0 && best_ask > 0.0 {
        spread_pct(best_bid, best_ask)
    } else {
        0.0
    };
    Ok(Quote {
        pair: pair.to_string(),
        price,
        best_bid,
        best_ask,
        spread_pct: sp,
        ts_ms,
    })
}

/// Absolute fractional change between the two most recent 5-minute closes.
///
/// When today's (JST) candles hold fewer than two closes, the prior day is
/// fetched and the series joined older-first. Fewer than two closes overall,
/// or a zero previous close, reads as 0.0: a data shortfall is "no
/// signal", never an error.
pub async fn vol5m_pct(md: &dyn MarketDataPort, pair: &str) -> Result<f64> {
    vol5m_pct_at(md, pair, Utc::now()).await
}

pub(crate) async fn vol5m_pct_at(
    md: &dyn MarketDataPort,
    pair: &str,
    now: DateTime<Utc>,
) -> Result<f64> {
    let today = yyyymmdd_jst(now);
    let cj = md.candlestick(pair, "5min", &today).await?;
    let mut closes = latest_two_closes(&cj);

    if closes.len() < 2 {
        let yday = yyyymmdd_jst(now - Duration::days(1));
        let cj2 = md.candlestick(pair, "5min", &yday).await?;
        let mut joined = latest_two_closes(&cj2);
        joined.append(&mut closes);
        let start = joined.len().saturating_sub(2);
        closes = joined[start..].to_vec();
    }

    if closes.len() < 2 || closes[0] == 0.0 {
        return Ok(0.0);
    }
    Ok((closes[1] / closes[0] - 1.0).abs())
}

/// 24h change in percent from the ticker's `open`/`last`. Reads as 0.0 when
/// `open` is missing or non-positive; only an unreachable ticker errors.
pub async fn change24h_pct(md: &dyn MarketDataPort, pair: &str) -> Result<f64> {
    let tj = md.ticker(pair).await?;
    let data = tj.get("data").cloned().unwrap_or(Value::Null);
    let open = data.get("open").map(num).unwrap_or(0.0);
    let last = data.get("last").map(num).unwrap_or(0.0);
    if open > 0.0 {
        Ok((last - open) / open * 100.0)
    } else {
        Ok(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
