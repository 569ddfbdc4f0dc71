//! Application services: wire the engine to its collaborators and expose
//! the operations the CLI drives.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::domain::buckets::BucketPair;
use crate::domain::exchange::ExchangeEngine;
use crate::infrastructure::memory::{
    InMemoryOracle, InMemoryRegistry, InMemoryReserve, InMemoryToken, ManualClock, OwnerAccess,
};
use crate::shared::errors::AppError;
use crate::shared::fixed::Fixed;
use crate::shared::types::{AccountId, AppConfig, Clock, ExchangeConfig, SystemClock};

/// A fully wired in-memory world: engine plus seeded collaborators.
pub struct Sandbox {
    pub clock: Arc<ManualClock>,
    pub oracle: Arc<InMemoryOracle>,
    pub gold: Arc<InMemoryToken>,
    pub stable: Arc<InMemoryToken>,
    pub registry: Arc<InMemoryRegistry>,
    pub engine: Arc<ExchangeEngine>,
    pub owner: AccountId,
    pub trader: AccountId,
    pub reserve_account: AccountId,
}

/// Build the sandbox from configuration: seed token balances and the
/// oracle feed, then boot the engine with its forced first refresh.
pub async fn build_sandbox(config: &AppConfig) -> Result<Sandbox, AppError> {
    let now = SystemClock.now_secs();
    let clock = Arc::new(ManualClock::new(now));
    let seed = &config.sandbox;

    let oracle = Arc::new(InMemoryOracle::new(
        seed.oracle_report_count,
        now.saturating_sub(1),
        seed.oracle_rate_numerator as u128,
        seed.oracle_rate_denominator as u128,
    ));
    let gold = Arc::new(InMemoryToken::new("AUX"));
    let stable = Arc::new(InMemoryToken::new("sAUX"));

    let owner = AccountId::new(seed.owner.clone());
    let trader = AccountId::new(seed.trader.clone());
    let reserve_account = AccountId::new(seed.reserve_account.clone());
    let reserve = Arc::new(InMemoryReserve::new(reserve_account.clone(), gold.clone()));
    let access = Arc::new(OwnerAccess::new(owner.clone()));

    gold.set_balance(&reserve_account, seed.reserve_gold_balance as u128)
        .await;
    gold.set_balance(&trader, seed.trader_gold_balance as u128)
        .await;
    if seed.trader_stable_balance > 0 {
        stable
            .set_balance(&trader, seed.trader_stable_balance as u128)
            .await;
    }

    let registry = Arc::new(InMemoryRegistry::new(
        oracle.clone(),
        reserve,
        gold.clone(),
        stable.clone(),
        access,
    ));
    let engine = Arc::new(
        ExchangeEngine::new(
            registry.clone(),
            clock.clone() as Arc<dyn Clock>,
            AccountId::new(seed.engine_account.clone()),
            config.exchange.clone(),
        )
        .await?,
    );

    Ok(Sandbox {
        clock,
        oracle,
        gold,
        stable,
        registry,
        engine,
        owner,
        trader,
        reserve_account,
    })
}

/// A priced quote, for display or JSON output.
#[derive(Debug, Serialize)]
pub struct QuoteView {
    pub sell_gold: bool,
    pub inverse: bool,
    pub amount_in: u128,
    pub amount_out: u128,
    pub gold_bucket: u128,
    pub stable_bucket: u128,
}

/// Outcome of an executed sandbox trade.
#[derive(Debug, Serialize)]
pub struct TradeView {
    pub sell_gold: bool,
    pub sell_amount: u128,
    pub buy_amount: u128,
    pub gold_bucket: u128,
    pub stable_bucket: u128,
}

/// Application service for exchange operations against the sandbox.
pub struct ExchangeService {
    config: AppConfig,
}

impl ExchangeService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn buckets(&self) -> Result<BucketPair, AppError> {
        let sandbox = build_sandbox(&self.config).await?;
        Ok(sandbox.engine.buckets().await)
    }

    /// Forward quote (`inverse = false`: how much comes out for `amount`
    /// in) or inverse quote (`inverse = true`: how much must go in for
    /// `amount` out).
    pub async fn quote(
        &self,
        amount: u128,
        sell_gold: bool,
        inverse: bool,
    ) -> Result<QuoteView, AppError> {
        let sandbox = build_sandbox(&self.config).await?;
        let engine = &sandbox.engine;
        let (amount_in, amount_out) = if inverse {
            let sell = engine.quote_sell_amount(amount, sell_gold).await?;
            (sell, amount)
        } else {
            let buy = engine.quote_buy_amount(amount, sell_gold).await?;
            (amount, buy)
        };
        let pair = engine.buckets().await;
        Ok(QuoteView {
            sell_gold,
            inverse,
            amount_in,
            amount_out,
            gold_bucket: pair.gold,
            stable_bucket: pair.stable,
        })
    }

    pub async fn trade(
        &self,
        sell_amount: u128,
        min_buy_amount: u128,
        sell_gold: bool,
    ) -> Result<TradeView, AppError> {
        let sandbox = build_sandbox(&self.config).await?;
        let buy_amount = sandbox
            .engine
            .exchange(&sandbox.trader, sell_amount, min_buy_amount, sell_gold)
            .await?;
        let pair = sandbox.engine.buckets().await;
        Ok(TradeView {
            sell_gold,
            sell_amount,
            buy_amount,
            gold_bucket: pair.gold,
            stable_bucket: pair.stable,
        })
    }

    /// Apply owner parameter changes; returns the resulting configuration.
    pub async fn set_parameters(
        &self,
        update_frequency_secs: Option<u64>,
        minimum_reports: Option<u64>,
        spread: Option<Fixed>,
        reserve_fraction: Option<Fixed>,
    ) -> Result<ExchangeConfig, AppError> {
        let sandbox = build_sandbox(&self.config).await?;
        let engine = &sandbox.engine;
        if let Some(secs) = update_frequency_secs {
            engine.set_update_frequency(&sandbox.owner, secs).await?;
        }
        if let Some(count) = minimum_reports {
            engine.set_minimum_reports(&sandbox.owner, count).await?;
        }
        if let Some(spread) = spread {
            engine.set_spread(&sandbox.owner, spread).await?;
        }
        if let Some(fraction) = reserve_fraction {
            engine.set_reserve_fraction(&sandbox.owner, fraction).await?;
        }
        Ok(engine.config().await)
    }

    /// Run a deterministic trading loop against the sandbox, advancing the
    /// simulated clock each round so bucket refreshes actually trigger.
    pub async fn simulate(
        &self,
        rounds: u32,
        step_secs: u64,
        interval_ms: u64,
    ) -> Result<(), AppError> {
        let sandbox = build_sandbox(&self.config).await?;
        let engine = &sandbox.engine;
        let base_rate = self.config.sandbox.oracle_rate_numerator as u128;

        info!(rounds, step_secs, "starting sandbox simulation");
        for round in 0..rounds {
            sandbox.clock.advance(step_secs);
            let now = sandbox.clock.now_secs();
            // keep the median fresh and let the rate wander a little
            sandbox.oracle.set_median_timestamp(now - 1).await;
            sandbox
                .oracle
                .set_rate(base_rate + (round % 3) as u128, 1)
                .await;

            let pair = engine.buckets().await;
            let sell_gold = round % 2 == 0;
            let (sell_bucket, _) = pair.oriented(sell_gold);
            let sell_amount = (sell_bucket / 100).max(1);

            match engine
                .exchange(&sandbox.trader, sell_amount, 0, sell_gold)
                .await
            {
                Ok(buy_amount) => {
                    let pair = engine.buckets().await;
                    info!(
                        round,
                        sell_gold,
                        sell_amount,
                        buy_amount,
                        gold_bucket = pair.gold,
                        stable_bucket = pair.stable,
                        "simulated trade"
                    );
                }
                Err(e) => warn!(round, sell_gold, sell_amount, "trade failed: {e}"),
            }

            sleep(Duration::from_millis(interval_ms)).await;
        }

        let events = engine.events().await;
        info!(trades = events.len(), "simulation finished");
        Ok(())
    }
}
