//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, the LINE channel token) are referenced by env-var name
//! in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::{PairWeight, TsumitateError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub budget: BudgetConfig,
    /// Ordered pair list; file order is the canonical pair order.
    pub pairs: Vec<PairWeight>,
    pub guards: GuardsConfig,
    pub dip: DipConfig,
    pub trading: TradingConfig,
    pub exchange: ExchangeConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BudgetConfig {
    /// Per-run budget before any dip adjustment, in whole JPY.
    pub total_jpy: i64,
    /// Balance below this adds a warning line to the run report.
    pub low_balance_alert_jpy: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardsConfig {
    pub max_spread_pct: f64,
    pub max_vol5m_pct: f64,
    /// Slippage limit. The check is an extension point and never rejects
    /// yet, but the field is part of the guard surface.
    pub max_slip_pct: Option<f64>,
    #[serde(default)]
    pub kill_switch: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DipConfig {
    /// 24h change at or below this flags a pair, e.g. -0.03.
    pub trigger_pct: f64,
    /// Budget multiplier for dip runs; <= 1.0 disables reallocation.
    pub multiplier: f64,
    /// Hard cap on the dip-adjusted total.
    pub max_total_jpy: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Real orders only go out when this is true.
    #[serde(default)]
    pub live: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub api_key_env: String,
    pub api_secret_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub channel_token_env: Option<String>,
    pub to_user_id_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make a run ill-defined. Runs fail
    /// here before any market data is touched.
    pub fn validate(&self) -> Result<(), TsumitateError> {
        if self.pairs.is_empty() {
            return Err(TsumitateError::Config(
                "at least one [[pairs]] entry is required".to_string(),
            ));
        }
        for w in &self.pairs {
            if w.weight < 0.0 {
                return Err(TsumitateError::Config(format!(
                    "negative weight for pair '{}'",
                    w.pair
                )));
            }
        }
        for (i, w) in self.pairs.iter().enumerate() {
            if self.pairs[..i].iter().any(|p| p.pair == w.pair) {
                return Err(TsumitateError::Config(format!(
                    "duplicate pair '{}'",
                    w.pair
                )));
            }
        }
        if self.budget.total_jpy < 0 {
            return Err(TsumitateError::Config(
                "budget.total_jpy must be >= 0".to_string(),
            ));
        }
        if self.dip.max_total_jpy < self.budget.total_jpy {
            return Err(TsumitateError::Config(
                "dip.max_total_jpy must be >= budget.total_jpy".to_string(),
            ));
        }
        Ok(())
    }

    /// The ordered pair/weight slice the allocator consumes.
    pub fn pair_weights(&self) -> &[PairWeight] {
        &self.pairs
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
