//! bitbank private API client.
//!
//! Authenticated endpoints used by the bot:
//! - `GET  /v1/user/assets`      — balances
//! - `POST /v1/user/spot/order`  — spot market order
//!
//! Auth is the classic nonce scheme:
//! - GET signs `nonce + path [+ "?" + query]`
//! - POST signs `nonce + body_json`, and the signed JSON string must be the
//!   exact bytes sent on the wire
//! with HMAC-SHA256 over the API secret, sent as `ACCESS-KEY` /
//! `ACCESS-NONCE` / `ACCESS-SIGNATURE` headers. The nonce is a monotonic
//! millisecond counter (same-millisecond calls get +1).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use super::{OrderResult, TradePort};

type HmacSha256 = Hmac<Sha256>;

const BASE_URL: &str = "https://api.bitbank.cc";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Authenticated bitbank REST client.
pub struct BitbankPrivateClient {
    http: Client,
    api_key: String,
    api_secret: String,
    last_nonce: Mutex<i64>,
}

impl BitbankPrivateClient {
    pub fn new(api_key: String, api_secret: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key,
            api_secret,
            last_nonce: Mutex::new(0),
        })
    }

    // ---- auth helpers ----------------------------------------------------

    fn next_nonce(&self) -> String {
        let mut last = self.last_nonce.lock().expect("nonce lock poisoned");
        let mut now = Utc::now().timestamp_millis();
        if now <= *last {
            now = *last + 1;
        }
        *last = now;
        now.to_string()
    }

    fn sign(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|_| anyhow!("invalid API secret for HMAC"))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    // ---- low-level -------------------------------------------------------

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let nonce = self.next_nonce();
        let signed = if query.is_empty() {
            format!("{nonce}{path}")
        } else {
            format!("{nonce}{path}?{query}")
        };
        let sig = self.sign(&signed)?;

        let url = if query.is_empty() {
            format!("{BASE_URL}{path}")
        } else {
            format!("{BASE_URL}{path}?{query}")
        };
        debug!(%url, "private GET");

        let resp = self
            .http
            .get(&url)
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-NONCE", &nonce)
            .header("ACCESS-SIGNATURE", &sig)
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| format!("private GET failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("private GET {url} -> {status}");
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("private GET json decode error: {url}"))?;

        if body.get("success").and_then(Value::as_i64) != Some(1) {
            bail!("private GET success!=1: {url} body={body}");
        }

        Ok(body)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        // The signed JSON string and the request body must match byte for byte.
        let payload = serde_json::to_string(body).context("Failed to serialize request body")?;

        let nonce = self.next_nonce();
        let sig = self.sign(&format!("{nonce}{payload}"))?;

        let url = format!("{BASE_URL}{path}");
        debug!(%url, "private POST");

        let resp = self
            .http
            .post(&url)
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-NONCE", &nonce)
            .header("ACCESS-SIGNATURE", &sig)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("private POST failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("private POST {url} -> {status} body={text}");
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("private POST json decode error: {url}"))?;

        if body.get("success").and_then(Value::as_i64) != Some(1) {
            bail!("private POST success!=1: {url} body={body}");
        }

        Ok(body)
    }
}

#[async_trait]
impl TradePort for BitbankPrivateClient {
    async fn free_balance(&self, asset: &str) -> Result<i64> {
        let body = self.get("/v1/user/assets", &[]).await?;
        Ok(parse_free_amount(&body, asset))
    }

    async fn market_buy(&self, pair: &str, quantity: f64) -> Result<OrderResult> {
        let body = json!({
            "pair": pair,
            "amount": format_amount(quantity),
            "side": "buy",
            "type": "market",
        });

        info!(pair, quantity, "Placing market buy");
        let resp = self.post("/v1/user/spot/order", &body).await?;
        let result = normalize_order_response(&resp);
        info!(
            pair,
            order_id = ?result.order_id,
            avg_price = result.avg_price,
            filled_qty = result.filled_qty,
            "Market buy accepted"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Read a numeric field the venue may encode as either a JSON number or a
/// decimal string. Missing or malformed values read as 0.0.
fn lenient_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Free amount of `asset` from a `/v1/user/assets` response, floored to the
/// minor unit. Unknown assets and malformed entries read as 0.
fn parse_free_amount(body: &Value, asset: &str) -> i64 {
    let assets = body
        .pointer("/data/assets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for entry in assets {
        let name = entry.get("asset").and_then(Value::as_str).unwrap_or("");
        if name.eq_ignore_ascii_case(asset) {
            let free = entry.get("free_amount").map(lenient_f64).unwrap_or(0.0);
            return free.floor() as i64;
        }
    }
    0
}

/// Normalize a spot-order response. The venue has shifted field names over
/// time, so several spellings of average price and executed amount are
/// accepted; the first fill's price is the final average-price fallback.
fn normalize_order_response(resp: &Value) -> OrderResult {
    let data = resp.get("data").cloned().unwrap_or(Value::Null);

    let avg_price = ["average_price", "avg_price"]
        .iter()
        .filter_map(|k| data.get(*k))
        .map(lenient_f64)
        .find(|p| *p > 0.0)
        .or_else(|| {
            data.pointer("/trades/0/price")
                .map(lenient_f64)
                .filter(|p| *p > 0.0)
        })
        .unwrap_or(0.0);

    let filled_qty = [
        "executed_amount",
        "executed_size",
        "filled_amount",
        "executed_quantity",
    ]
    .iter()
    .filter_map(|k| data.get(*k))
    .map(lenient_f64)
    .find(|q| *q > 0.0)
    .unwrap_or(0.0);

    let order_id = data
        .get("order_id")
        .or_else(|| data.get("orderId"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    OrderResult {
        order_id,
        avg_price,
        filled_qty,
    }
}

/// Render an order quantity the way the venue expects: up to 8 decimals,
/// trailing zeros stripped.
fn format_amount(quantity: f64) -> String {
    let s = format!("{quantity:.8}");
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
