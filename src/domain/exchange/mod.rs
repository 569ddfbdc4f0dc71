//! Trade executor: orchestrates exchanges between the gold and stable
//! assets against the oracle-anchored liquidity buckets.
//!
//! Every mutating call runs under one exclusive write lock covering the
//! bucket refresh, the quote, the bucket mutation and the external custody
//! calls, so a trade either commits everything or nothing. Stored state is
//! only written after every external call has succeeded; a failure anywhere
//! simply drops the staged copy.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::buckets::{
    anchored_pair, compute_refresh, BucketPair, BucketState, OracleSnapshot,
};
use crate::domain::collaborators::{
    GoldAsset, Registry, ReserveCustody, StableAsset,
};
use crate::domain::pricing;
use crate::shared::errors::ExchangeError;
use crate::shared::fixed::Fixed;
use crate::shared::types::{
    validate_reserve_fraction, validate_spread, AccountId, Clock, ExchangeConfig,
};

/// Notifications emitted for external indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExchangeEvent {
    TradeCompleted {
        trade_id: String,
        trader: AccountId,
        sell_amount: u128,
        buy_amount: u128,
        sold_gold: bool,
        timestamp: u64,
    },
    UpdateFrequencySet {
        update_frequency_secs: u64,
    },
    MinimumReportsSet {
        minimum_reports: u64,
    },
    SpreadSet {
        spread: Fixed,
    },
    ReserveFractionSet {
        reserve_fraction: Fixed,
    },
}

struct EngineState {
    config: ExchangeConfig,
    buckets: BucketState,
}

/// The exchange engine: bucket store, pricing and trade execution behind
/// one exclusive-access boundary.
pub struct ExchangeEngine {
    registry: Arc<dyn Registry>,
    clock: Arc<dyn Clock>,
    /// The engine's own custody account; sold stable tokens pass through it
    /// on their way to being burned.
    account: AccountId,
    state: RwLock<EngineState>,
    events: RwLock<Vec<ExchangeEvent>>,
}

impl ExchangeEngine {
    /// Create the engine with a forced first refresh: buckets start
    /// anchored to the current oracle sample and reserve balance.
    pub async fn new(
        registry: Arc<dyn Registry>,
        clock: Arc<dyn Clock>,
        account: AccountId,
        config: ExchangeConfig,
    ) -> Result<Self, ExchangeError> {
        config.validate()?;
        let oracle = registry.oracle().await;
        let reserve = registry.reserve().await;
        let snapshot = OracleSnapshot::read(oracle.as_ref()).await?;
        let balance = reserve.gold_balance().await?;
        let pair = anchored_pair(&config, &snapshot, balance)?;
        let now = clock.now_secs();
        info!(gold = pair.gold, stable = pair.stable, "exchange engine initialized");
        Ok(Self::restore(
            registry,
            clock,
            account,
            config,
            BucketState::new(pair.gold, pair.stable, now),
        )?)
    }

    /// Re-create the engine around previously persisted bucket state.
    pub fn restore(
        registry: Arc<dyn Registry>,
        clock: Arc<dyn Clock>,
        account: AccountId,
        config: ExchangeConfig,
        buckets: BucketState,
    ) -> Result<Self, ExchangeError> {
        config.validate()?;
        Ok(Self {
            registry,
            clock,
            account,
            state: RwLock::new(EngineState { config, buckets }),
            events: RwLock::new(Vec::new()),
        })
    }

    /// Execute a trade: sell `sell_amount` of one asset for at least
    /// `min_buy_amount` of the other. Returns the bought amount.
    pub async fn exchange(
        &self,
        caller: &AccountId,
        sell_amount: u128,
        min_buy_amount: u128,
        sell_gold: bool,
    ) -> Result<u128, ExchangeError> {
        let oracle = self.registry.oracle().await;
        let reserve = self.registry.reserve().await;
        let gold = self.registry.gold_asset().await;
        let stable = self.registry.stable_asset().await;

        let mut state = self.state.write().await;
        let now = self.clock.now_secs();
        let snapshot = OracleSnapshot::read(oracle.as_ref()).await?;
        let reserve_balance = reserve.gold_balance().await?;

        // Stage the persisting refresh; it is only committed below,
        // together with the trade itself.
        let mut buckets = state.buckets.clone();
        if let Some(pair) = compute_refresh(&buckets, &state.config, now, &snapshot, reserve_balance)? {
            debug!(gold = pair.gold, stable = pair.stable, "refreshing buckets from oracle");
            buckets.apply_refresh(pair, now);
        }

        let (sell_bucket, buy_bucket) = buckets.pair().oriented(sell_gold);
        let buy_amount = pricing::buy_amount(sell_amount, sell_bucket, buy_bucket, state.config.spread)?;
        if buy_amount < min_buy_amount {
            warn!(buy_amount, min_buy_amount, "trade rejected: slippage exceeded");
            return Err(ExchangeError::SlippageExceeded {
                minimum: min_buy_amount,
                actual: buy_amount,
            });
        }
        buckets.record_trade(sell_amount, buy_amount, sell_gold)?;

        self.move_assets(
            reserve.as_ref(),
            gold.as_ref(),
            stable.as_ref(),
            caller,
            sell_amount,
            buy_amount,
            sell_gold,
        )
        .await?;

        // Commit: every external call succeeded.
        state.buckets = buckets;
        let trade_id = uuid::Uuid::new_v4().to_string();
        info!(
            %trade_id,
            trader = %caller,
            sell_amount,
            buy_amount,
            sell_gold,
            "trade completed"
        );
        self.push_event(ExchangeEvent::TradeCompleted {
            trade_id,
            trader: caller.clone(),
            sell_amount,
            buy_amount,
            sold_gold: sell_gold,
            timestamp: now,
        })
        .await;
        Ok(buy_amount)
    }

    /// Two-sided asset movement. Later failures unwind earlier legs so a
    /// failed trade leaves the caller whole.
    async fn move_assets(
        &self,
        reserve: &dyn ReserveCustody,
        gold: &dyn GoldAsset,
        stable: &dyn StableAsset,
        caller: &AccountId,
        sell_amount: u128,
        buy_amount: u128,
        sell_gold: bool,
    ) -> Result<(), ExchangeError> {
        if sell_gold {
            gold.transfer_from(caller, &reserve.account_id(), sell_amount)
                .await?;
            if let Err(err) = stable.mint(caller, buy_amount).await {
                if let Err(refund_err) = reserve.release_gold(caller, sell_amount).await {
                    error!(%refund_err, "failed to return gold after aborted mint");
                }
                return Err(err);
            }
        } else {
            stable
                .transfer_from(caller, &self.account, sell_amount)
                .await?;
            if let Err(err) = stable.burn(&self.account, sell_amount).await {
                if let Err(refund_err) =
                    stable.transfer_from(&self.account, caller, sell_amount).await
                {
                    error!(%refund_err, "failed to return stable after aborted burn");
                }
                return Err(err);
            }
            if let Err(err) = reserve.release_gold(caller, buy_amount).await {
                // the sold stable is already burned; restore it by minting
                if let Err(refund_err) = stable.mint(caller, sell_amount).await {
                    error!(%refund_err, "failed to restore stable after aborted release");
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Read-only forward quote against a hypothetically refreshed bucket
    /// pair; stored state is never touched.
    pub async fn quote_buy_amount(
        &self,
        sell_amount: u128,
        sell_gold: bool,
    ) -> Result<u128, ExchangeError> {
        let (pair, spread) = self.virtual_buckets().await?;
        let (sell_bucket, buy_bucket) = pair.oriented(sell_gold);
        pricing::buy_amount(sell_amount, sell_bucket, buy_bucket, spread)
    }

    /// Read-only inverse quote: sell amount required for `buy_amount`.
    pub async fn quote_sell_amount(
        &self,
        buy_amount: u128,
        sell_gold: bool,
    ) -> Result<u128, ExchangeError> {
        let (pair, spread) = self.virtual_buckets().await?;
        let (sell_bucket, buy_bucket) = pair.oriented(sell_gold);
        pricing::sell_amount(buy_amount, sell_bucket, buy_bucket, spread)
    }

    async fn virtual_buckets(&self) -> Result<(BucketPair, Fixed), ExchangeError> {
        let oracle = self.registry.oracle().await;
        let reserve = self.registry.reserve().await;
        let state = self.state.read().await;
        let now = self.clock.now_secs();
        let snapshot = OracleSnapshot::read(oracle.as_ref()).await?;
        let balance = reserve.gold_balance().await?;
        let pair = state
            .buckets
            .virtual_pair(&state.config, now, &snapshot, balance)?;
        Ok((pair, state.config.spread))
    }

    /// The currently stored bucket pair.
    pub async fn buckets(&self) -> BucketPair {
        self.state.read().await.buckets.pair()
    }

    pub async fn config(&self) -> ExchangeConfig {
        self.state.read().await.config.clone()
    }

    pub async fn set_update_frequency(
        &self,
        caller: &AccountId,
        update_frequency_secs: u64,
    ) -> Result<(), ExchangeError> {
        self.require_owner(caller).await?;
        self.state.write().await.config.update_frequency_secs = update_frequency_secs;
        info!(update_frequency_secs, "update frequency changed");
        self.push_event(ExchangeEvent::UpdateFrequencySet {
            update_frequency_secs,
        })
        .await;
        Ok(())
    }

    pub async fn set_minimum_reports(
        &self,
        caller: &AccountId,
        minimum_reports: u64,
    ) -> Result<(), ExchangeError> {
        self.require_owner(caller).await?;
        self.state.write().await.config.minimum_reports = minimum_reports;
        info!(minimum_reports, "minimum report count changed");
        self.push_event(ExchangeEvent::MinimumReportsSet { minimum_reports })
            .await;
        Ok(())
    }

    pub async fn set_spread(&self, caller: &AccountId, spread: Fixed) -> Result<(), ExchangeError> {
        self.require_owner(caller).await?;
        validate_spread(spread)?;
        self.state.write().await.config.spread = spread;
        info!(%spread, "spread changed");
        self.push_event(ExchangeEvent::SpreadSet { spread }).await;
        Ok(())
    }

    pub async fn set_reserve_fraction(
        &self,
        caller: &AccountId,
        reserve_fraction: Fixed,
    ) -> Result<(), ExchangeError> {
        self.require_owner(caller).await?;
        validate_reserve_fraction(reserve_fraction)?;
        self.state.write().await.config.reserve_fraction = reserve_fraction;
        info!(%reserve_fraction, "reserve fraction changed");
        self.push_event(ExchangeEvent::ReserveFractionSet { reserve_fraction })
            .await;
        Ok(())
    }

    /// Events emitted so far, oldest first.
    pub async fn events(&self) -> Vec<ExchangeEvent> {
        self.events.read().await.clone()
    }

    async fn require_owner(&self, caller: &AccountId) -> Result<(), ExchangeError> {
        let access = self.registry.access_control().await;
        if !access.is_owner(caller).await? {
            return Err(ExchangeError::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    async fn push_event(&self, event: ExchangeEvent) {
        self.events.write().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::infrastructure::memory::{
        InMemoryOracle, InMemoryRegistry, InMemoryReserve, InMemoryToken, ManualClock, OwnerAccess,
    };
    use crate::shared::fixed::SCALE;

    const NOW: u64 = 1_000_000;

    struct World {
        clock: Arc<ManualClock>,
        oracle: Arc<InMemoryOracle>,
        gold: Arc<InMemoryToken>,
        stable: Arc<InMemoryToken>,
        registry: Arc<InMemoryRegistry>,
        reserve_account: AccountId,
        owner: AccountId,
        trader: AccountId,
        engine: ExchangeEngine,
    }

    /// Reserve holds 2000 gold, reserve fraction is 1/2 and the oracle
    /// rate is 2 stable per gold, so the engine boots with buckets
    /// (gold 1000, stable 2000).
    async fn world() -> World {
        let clock = Arc::new(ManualClock::new(NOW));
        let oracle = Arc::new(InMemoryOracle::new(3, NOW - 1, 2, 1));
        let gold = Arc::new(InMemoryToken::new("AUX"));
        let stable = Arc::new(InMemoryToken::new("sAUX"));
        let reserve_account = AccountId::from("reserve");
        let reserve = Arc::new(InMemoryReserve::new(reserve_account.clone(), gold.clone()));
        let owner = AccountId::from("owner");
        let trader = AccountId::from("trader");
        let access = Arc::new(OwnerAccess::new(owner.clone()));
        let registry = Arc::new(InMemoryRegistry::new(
            oracle.clone(),
            reserve,
            gold.clone(),
            stable.clone(),
            access,
        ));

        gold.set_balance(&reserve_account, 2_000).await;
        gold.set_balance(&trader, 1_000).await;

        let config = ExchangeConfig {
            spread: Fixed::ZERO,
            reserve_fraction: Fixed::from_raw(SCALE / 2),
            update_frequency_secs: 300,
            minimum_reports: 2,
        };
        let engine = ExchangeEngine::new(
            registry.clone(),
            clock.clone() as Arc<dyn Clock>,
            AccountId::from("engine"),
            config,
        )
        .await
        .unwrap();

        World {
            clock,
            oracle,
            gold,
            stable,
            registry,
            reserve_account,
            owner,
            trader,
            engine,
        }
    }

    #[tokio::test]
    async fn initialization_anchors_buckets_to_oracle() {
        let w = world().await;
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_000,
                stable: 2_000
            }
        );
    }

    #[tokio::test]
    async fn selling_gold_mints_stable_and_grows_gold_bucket() {
        let w = world().await;
        let bought = w.engine.exchange(&w.trader, 100, 181, true).await.unwrap();
        assert_eq!(bought, 181);
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_100,
                stable: 1_819
            }
        );
        assert_eq!(w.gold.balance(&w.trader).await, 900);
        assert_eq!(w.gold.balance(&w.reserve_account).await, 2_100);
        assert_eq!(w.stable.balance(&w.trader).await, 181);
        assert_eq!(w.stable.total_supply().await, 181);

        let events = w.engine.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ExchangeEvent::TradeCompleted {
                trade_id,
                trader,
                sell_amount,
                buy_amount,
                sold_gold,
                timestamp,
            } => {
                assert!(!trade_id.is_empty());
                assert_eq!(trader, &w.trader);
                assert_eq!(*sell_amount, 100);
                assert_eq!(*buy_amount, 181);
                assert!(sold_gold);
                assert_eq!(*timestamp, NOW);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn selling_stable_burns_it_and_releases_gold() {
        let w = world().await;
        StableAsset::mint(w.stable.as_ref(), &w.trader, 500)
            .await
            .unwrap();

        // sell bucket is stable (2000), buy bucket gold (1000):
        // 200 × 1000 / 2200 = 90.9 → 90
        let bought = w.engine.exchange(&w.trader, 200, 90, false).await.unwrap();
        assert_eq!(bought, 90);
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 910,
                stable: 2_200
            }
        );
        assert_eq!(w.stable.balance(&w.trader).await, 300);
        assert_eq!(w.stable.total_supply().await, 300);
        assert_eq!(w.gold.balance(&w.trader).await, 1_090);
        assert_eq!(w.gold.balance(&w.reserve_account).await, 1_910);
    }

    #[tokio::test]
    async fn slippage_rejection_changes_nothing() {
        let w = world().await;
        let err = w
            .engine
            .exchange(&w.trader, 100, 182, true)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::SlippageExceeded {
                minimum: 182,
                actual: 181
            }
        );
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_000,
                stable: 2_000
            }
        );
        assert_eq!(w.gold.balance(&w.trader).await, 1_000);
        assert_eq!(w.gold.balance(&w.reserve_account).await, 2_000);
        assert_eq!(w.stable.total_supply().await, 0);
        assert!(w.engine.events().await.is_empty());
    }

    #[tokio::test]
    async fn quotes_use_hypothetical_refresh_without_persisting() {
        let w = world().await;
        w.clock.advance(300);
        w.oracle.set_median_timestamp(NOW + 299).await;
        w.oracle.set_rate(3, 1).await;

        // virtual pair: gold = 2000 × 0.5 = 1000, stable = 3000
        let quoted = w.engine.quote_buy_amount(100, true).await.unwrap();
        assert_eq!(quoted, 272); // 100 × 3000 / 1100

        // stored buckets untouched; a second quote virtually refreshes again
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_000,
                stable: 2_000
            }
        );
        assert_eq!(w.engine.quote_buy_amount(100, true).await.unwrap(), 272);
    }

    #[tokio::test]
    async fn inverse_quote_against_virtual_buckets() {
        let w = world().await;
        assert_eq!(w.engine.quote_sell_amount(181, true).await.unwrap(), 99);
        let err = w.engine.quote_sell_amount(2_000, true).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientLiquidity(_)));
    }

    #[tokio::test]
    async fn trade_commits_a_due_refresh() {
        let w = world().await;
        w.clock.advance(300);
        w.oracle.set_median_timestamp(NOW + 299).await;
        w.oracle.set_rate(3, 1).await;

        let bought = w.engine.exchange(&w.trader, 100, 0, true).await.unwrap();
        assert_eq!(bought, 272);
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_100,
                stable: 2_728
            }
        );
    }

    #[tokio::test]
    async fn too_few_reports_leave_buckets_stale() {
        let w = world().await;
        w.clock.advance(300);
        w.oracle.set_median_timestamp(NOW + 299).await;
        w.oracle.set_rate(3, 1).await;
        w.oracle.set_report_count(1).await;

        // refresh suppressed; trade prices against the old (1000, 2000)
        let bought = w.engine.exchange(&w.trader, 100, 0, true).await.unwrap();
        assert_eq!(bought, 181);
    }

    #[tokio::test]
    async fn failed_gold_release_rolls_back_stable_sale() {
        let w = world().await;
        StableAsset::mint(w.stable.as_ref(), &w.trader, 500)
            .await
            .unwrap();
        // drain the reserve so releasing gold must fail; buckets still
        // hold the boot-time sizes because no refresh is due
        w.gold.set_balance(&w.reserve_account, 0).await;

        let err = w
            .engine
            .exchange(&w.trader, 200, 0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::CustodyFailure(_)));

        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_000,
                stable: 2_000
            }
        );
        assert_eq!(w.stable.balance(&w.trader).await, 500);
        assert_eq!(w.stable.total_supply().await, 500);
        assert_eq!(w.gold.balance(&w.trader).await, 1_000);
        assert!(w.engine.events().await.is_empty());
    }

    struct MintRejectingStable {
        inner: Arc<InMemoryToken>,
    }

    #[async_trait]
    impl StableAsset for MintRejectingStable {
        async fn transfer_from(
            &self,
            from: &AccountId,
            to: &AccountId,
            amount: u128,
        ) -> Result<(), ExchangeError> {
            StableAsset::transfer_from(self.inner.as_ref(), from, to, amount).await
        }

        async fn mint(&self, _to: &AccountId, _amount: u128) -> Result<(), ExchangeError> {
            Err(ExchangeError::CustodyFailure("mint disabled".to_string()))
        }

        async fn burn(&self, from: &AccountId, amount: u128) -> Result<(), ExchangeError> {
            StableAsset::burn(self.inner.as_ref(), from, amount).await
        }

        async fn balance_of(&self, holder: &AccountId) -> Result<u128, ExchangeError> {
            StableAsset::balance_of(self.inner.as_ref(), holder).await
        }
    }

    #[tokio::test]
    async fn failed_mint_refunds_pulled_gold() {
        let w = world().await;
        w.registry
            .swap_stable_asset(Arc::new(MintRejectingStable {
                inner: w.stable.clone(),
            }))
            .await;

        let err = w
            .engine
            .exchange(&w.trader, 100, 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::CustodyFailure(_)));

        assert_eq!(w.gold.balance(&w.trader).await, 1_000);
        assert_eq!(w.gold.balance(&w.reserve_account).await, 2_000);
        assert_eq!(w.stable.total_supply().await, 0);
        assert_eq!(
            w.engine.buckets().await,
            BucketPair {
                gold: 1_000,
                stable: 2_000
            }
        );
    }

    #[tokio::test]
    async fn non_owner_cannot_change_parameters() {
        let w = world().await;
        let err = w
            .engine
            .set_update_frequency(&w.trader, 60)
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Unauthorized(w.trader.clone()));
        let err = w
            .engine
            .set_minimum_reports(&w.trader, 5)
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Unauthorized(w.trader.clone()));

        let config = w.engine.config().await;
        assert_eq!(config.update_frequency_secs, 300);
        assert_eq!(config.minimum_reports, 2);
        assert!(w.engine.events().await.is_empty());
    }

    #[tokio::test]
    async fn owner_parameter_changes_emit_events() {
        let w = world().await;
        w.engine.set_update_frequency(&w.owner, 60).await.unwrap();
        w.engine.set_minimum_reports(&w.owner, 5).await.unwrap();
        let spread = Fixed::from_raw(SCALE / 100);
        w.engine.set_spread(&w.owner, spread).await.unwrap();

        let config = w.engine.config().await;
        assert_eq!(config.update_frequency_secs, 60);
        assert_eq!(config.minimum_reports, 5);
        assert_eq!(config.spread, spread);

        assert_eq!(
            w.engine.events().await,
            vec![
                ExchangeEvent::UpdateFrequencySet {
                    update_frequency_secs: 60
                },
                ExchangeEvent::MinimumReportsSet { minimum_reports: 5 },
                ExchangeEvent::SpreadSet { spread },
            ]
        );
    }

    #[tokio::test]
    async fn spread_of_one_is_rejected() {
        let w = world().await;
        let err = w.engine.set_spread(&w.owner, Fixed::ONE).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameter(_)));
        assert_eq!(w.engine.config().await.spread, Fixed::ZERO);
    }

    #[tokio::test]
    async fn swapped_oracle_is_used_on_the_next_call() {
        let w = world().await;
        w.registry
            .swap_oracle(Arc::new(InMemoryOracle::new(5, NOW + 299, 4, 1)))
            .await;
        w.clock.advance(300);

        // virtual pair now anchors at 4 stable per gold
        let quoted = w.engine.quote_buy_amount(100, true).await.unwrap();
        assert_eq!(quoted, 363); // 100 × 4000 / 1100
    }
}
