//! bitbank public API client.
//!
//! Unauthenticated market data endpoints:
//! - `GET /{pair}/ticker`
//! - `GET /{pair}/depth`
//! - `GET /{pair}/candlestick/{candle_type}/{yyyymmdd}`
//!
//! Every response is `{"success": 1, "data": {...}}`; `success != 1` is an
//! error even on HTTP 200. `yyyymmdd` is the JST calendar day.
//!
//! API docs: https://github.com/bitbankinc/bitbank-api-docs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::MarketDataPort;

const BASE_URL: &str = "https://public.bitbank.cc";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Thin wrapper over the bitbank public REST API.
pub struct BitbankPublicClient {
    http: Client,
}

impl BitbankPublicClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{BASE_URL}{path}");
        debug!(%url, "public GET");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("public GET failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("public GET {url} -> {status}");
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("public GET json decode error: {url}"))?;

        if body.get("success").and_then(Value::as_i64) != Some(1) {
            bail!("public GET success!=1: {url} body={body}");
        }

        Ok(body)
    }
}

#[async_trait]
impl MarketDataPort for BitbankPublicClient {
    async fn ticker(&self, pair: &str) -> Result<Value> {
        self.get(&format!("/{pair}/ticker")).await
    }

    async fn depth(&self, pair: &str) -> Result<Value> {
        self.get(&format!("/{pair}/depth")).await
    }

    async fn candlestick(&self, pair: &str, candle_type: &str, yyyymmdd: &str) -> Result<Value> {
        self.get(&format!("/{pair}/candlestick/{candle_type}/{yyyymmdd}"))
            .await
    }
}
