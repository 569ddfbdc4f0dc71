//! Common types used across the engine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::errors::ExchangeError;
use crate::shared::fixed::{Fixed, SCALE};

/// Opaque account identifier for callers, custody accounts and token holders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time source injected into the engine so tests can control "now".
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall-clock time in unix seconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Owner-controlled exchange parameters.
///
/// Mutated only through the engine's admin setters; parameterizes both the
/// bucket refresh decision and the pricing formulas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Fractional fee in [0, 1) deducted from trades.
    pub spread: Fixed,
    /// Fraction of the custodied reserve committed to the gold bucket.
    pub reserve_fraction: Fixed,
    /// Minimum seconds between bucket refreshes.
    pub update_frequency_secs: u64,
    /// Minimum count of valid oracle reports required for a refresh.
    pub minimum_reports: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            spread: Fixed::from_raw(SCALE / 200),           // 0.005
            reserve_fraction: Fixed::from_raw(SCALE / 4),   // 0.25
            update_frequency_secs: 300,
            minimum_reports: 1,
        }
    }
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<(), ExchangeError> {
        validate_spread(self.spread)?;
        validate_reserve_fraction(self.reserve_fraction)
    }
}

pub fn validate_spread(spread: Fixed) -> Result<(), ExchangeError> {
    if spread >= Fixed::ONE {
        return Err(ExchangeError::InvalidParameter(format!(
            "spread must be below 1, got {spread}"
        )));
    }
    Ok(())
}

pub fn validate_reserve_fraction(fraction: Fixed) -> Result<(), ExchangeError> {
    if fraction > Fixed::ONE {
        return Err(ExchangeError::InvalidParameter(format!(
            "reserve fraction must not exceed 1, got {fraction}"
        )));
    }
    Ok(())
}

/// Seed data for the in-memory sandbox the CLI runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub owner: String,
    pub trader: String,
    pub reserve_account: String,
    pub engine_account: String,
    pub reserve_gold_balance: u64,
    pub trader_gold_balance: u64,
    pub trader_stable_balance: u64,
    pub oracle_report_count: u64,
    pub oracle_rate_numerator: u64,
    pub oracle_rate_denominator: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            owner: "owner".to_string(),
            trader: "trader".to_string(),
            reserve_account: "reserve-custody".to_string(),
            engine_account: "exchange-engine".to_string(),
            reserve_gold_balance: 1_000_000,
            trader_gold_balance: 50_000,
            trader_stable_balance: 50_000,
            oracle_report_count: 3,
            oracle_rate_numerator: 2,
            oracle_rate_denominator: 1,
        }
    }
}

/// Top-level application configuration (Config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub sandbox: SandboxConfig,
}
