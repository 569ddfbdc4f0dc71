//! Bucket store: decides when the liquidity buckets should track the
//! oracle and computes the refreshed sizes.
//!
//! The refresh decision and computation live in pure functions so the
//! persisting path (inside a trade) and the virtual path (inside a quote)
//! share one implementation of the precondition logic.

use serde::{Deserialize, Serialize};

use crate::domain::collaborators::RateOracle;
use crate::shared::errors::ExchangeError;
use crate::shared::fixed::{mul_div, SCALE};
use crate::shared::types::ExchangeConfig;

/// One consistent read of the oracle for the gold/stable pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSnapshot {
    pub report_count: u64,
    pub median_timestamp: u64,
    pub rate_numerator: u128,
    pub rate_denominator: u128,
}

impl OracleSnapshot {
    pub async fn read(oracle: &dyn RateOracle) -> Result<Self, ExchangeError> {
        let report_count = oracle.num_rates().await?;
        let median_timestamp = oracle.median_timestamp().await?;
        let (rate_numerator, rate_denominator) = oracle.median_rate().await?;
        Ok(Self {
            report_count,
            median_timestamp,
            rate_numerator,
            rate_denominator,
        })
    }
}

/// A gold/stable bucket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPair {
    pub gold: u128,
    pub stable: u128,
}

impl BucketPair {
    /// Orient the pair as (sell bucket, buy bucket) for a trade direction.
    pub fn oriented(&self, sell_gold: bool) -> (u128, u128) {
        if sell_gold {
            (self.gold, self.stable)
        } else {
            (self.stable, self.gold)
        }
    }
}

/// The only persisted mutable state the engine owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketState {
    pub gold_bucket: u128,
    pub stable_bucket: u128,
    pub last_bucket_update: u64,
}

impl BucketState {
    pub fn new(gold_bucket: u128, stable_bucket: u128, last_bucket_update: u64) -> Self {
        Self {
            gold_bucket,
            stable_bucket,
            last_bucket_update,
        }
    }

    pub fn pair(&self) -> BucketPair {
        BucketPair {
            gold: self.gold_bucket,
            stable: self.stable_bucket,
        }
    }

    /// Overwrite both buckets from a refresh. Both sides always change
    /// together; there is no path that updates one bucket alone.
    pub fn apply_refresh(&mut self, pair: BucketPair, now: u64) {
        self.gold_bucket = pair.gold;
        self.stable_bucket = pair.stable;
        self.last_bucket_update = now;
    }

    /// The hypothetical pair a trade happening now would price against,
    /// without writing anything.
    pub fn virtual_pair(
        &self,
        config: &ExchangeConfig,
        now: u64,
        snapshot: &OracleSnapshot,
        reserve_gold_balance: u128,
    ) -> Result<BucketPair, ExchangeError> {
        Ok(compute_refresh(self, config, now, snapshot, reserve_gold_balance)?
            .unwrap_or_else(|| self.pair()))
    }

    /// Fold an executed trade into the buckets. Either both sides move or
    /// neither does.
    pub fn record_trade(
        &mut self,
        sell_amount: u128,
        buy_amount: u128,
        sell_gold: bool,
    ) -> Result<(), ExchangeError> {
        let (sell_bucket, buy_bucket) = self.pair().oriented(sell_gold);
        let grown = sell_bucket.checked_add(sell_amount).ok_or_else(|| {
            ExchangeError::InsufficientLiquidity("bucket overflow on sell side".to_string())
        })?;
        let shrunk = buy_bucket.checked_sub(buy_amount).ok_or_else(|| {
            ExchangeError::InsufficientLiquidity("buy bucket smaller than buy amount".to_string())
        })?;
        if sell_gold {
            self.gold_bucket = grown;
            self.stable_bucket = shrunk;
        } else {
            self.stable_bucket = grown;
            self.gold_bucket = shrunk;
        }
        Ok(())
    }
}

/// Refresh precondition. All three must hold:
/// 1. the stored buckets are at least `update_frequency_secs` old,
/// 2. the oracle has enough valid reports,
/// 3. the median itself is newer than `now − update_frequency_secs`.
pub fn should_update(
    state: &BucketState,
    config: &ExchangeConfig,
    now: u64,
    snapshot: &OracleSnapshot,
) -> bool {
    now.saturating_sub(state.last_bucket_update) >= config.update_frequency_secs
        && snapshot.report_count >= config.minimum_reports
        && snapshot.median_timestamp > now.saturating_sub(config.update_frequency_secs)
}

/// Bucket sizes anchored to the current oracle sample: the gold bucket is
/// a fraction of the live reserve balance and the stable bucket follows at
/// the oracle median rate.
pub fn anchored_pair(
    config: &ExchangeConfig,
    snapshot: &OracleSnapshot,
    reserve_gold_balance: u128,
) -> Result<BucketPair, ExchangeError> {
    let gold = mul_div(reserve_gold_balance, config.reserve_fraction.raw(), SCALE)?;
    let stable = mul_div(gold, snapshot.rate_numerator, snapshot.rate_denominator)?;
    Ok(BucketPair { gold, stable })
}

/// Compute the refreshed bucket pair, or `None` when the precondition does
/// not hold.
pub fn compute_refresh(
    state: &BucketState,
    config: &ExchangeConfig,
    now: u64,
    snapshot: &OracleSnapshot,
    reserve_gold_balance: u128,
) -> Result<Option<BucketPair>, ExchangeError> {
    if !should_update(state, config, now, snapshot) {
        return Ok(None);
    }
    anchored_pair(config, snapshot, reserve_gold_balance).map(Some)
}
