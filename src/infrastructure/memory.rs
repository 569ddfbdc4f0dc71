//! In-memory collaborator implementations backing the CLI sandbox and the
//! test suite. Balances and oracle feeds live behind `tokio::sync::RwLock`
//! so they can be reseeded while the engine is running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use tokio::sync::RwLock;

use crate::domain::collaborators::{
    AccessControl, GoldAsset, RateOracle, Registry, ReserveCustody, StableAsset,
};
use crate::shared::errors::ExchangeError;
use crate::shared::types::{AccountId, Clock};

/// Manually advanced clock.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(now_secs),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now_secs: u64) {
        self.now.store(now_secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct OracleFeed {
    report_count: u64,
    median_timestamp: u64,
    rate_numerator: u128,
    rate_denominator: u128,
}

/// Seedable median-rate oracle.
pub struct InMemoryOracle {
    feed: RwLock<OracleFeed>,
}

impl InMemoryOracle {
    pub fn new(
        report_count: u64,
        median_timestamp: u64,
        rate_numerator: u128,
        rate_denominator: u128,
    ) -> Self {
        Self {
            feed: RwLock::new(OracleFeed {
                report_count,
                median_timestamp,
                rate_numerator,
                rate_denominator,
            }),
        }
    }

    pub async fn set_rate(&self, numerator: u128, denominator: u128) {
        let mut feed = self.feed.write().await;
        feed.rate_numerator = numerator;
        feed.rate_denominator = denominator;
    }

    pub async fn set_report_count(&self, count: u64) {
        self.feed.write().await.report_count = count;
    }

    pub async fn set_median_timestamp(&self, timestamp: u64) {
        self.feed.write().await.median_timestamp = timestamp;
    }
}

#[async_trait]
impl RateOracle for InMemoryOracle {
    async fn num_rates(&self) -> Result<u64, ExchangeError> {
        Ok(self.feed.read().await.report_count)
    }

    async fn median_timestamp(&self) -> Result<u64, ExchangeError> {
        Ok(self.feed.read().await.median_timestamp)
    }

    async fn median_rate(&self) -> Result<(u128, u128), ExchangeError> {
        let feed = self.feed.read().await;
        Ok((feed.rate_numerator, feed.rate_denominator))
    }
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

/// Simple token ledger; implements both the transfer-style gold asset and
/// the mintable/burnable stable asset interfaces.
pub struct InMemoryToken {
    symbol: String,
    ledger: RwLock<Ledger>,
}

impl InMemoryToken {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ledger: RwLock::new(Ledger::default()),
        }
    }

    /// Seed a balance, adjusting total supply accordingly.
    pub async fn set_balance(&self, holder: &AccountId, amount: u128) {
        let mut ledger = self.ledger.write().await;
        let old = ledger.balances.insert(holder.clone(), amount).unwrap_or(0);
        ledger.total_supply = ledger.total_supply - old + amount;
    }

    pub async fn balance(&self, holder: &AccountId) -> u128 {
        self.ledger
            .read()
            .await
            .balances
            .get(holder)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_supply(&self) -> u128 {
        self.ledger.read().await.total_supply
    }

    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError> {
        let mut ledger = self.ledger.write().await;
        let from_balance = ledger.balances.get(from).copied().unwrap_or(0);
        let debited = from_balance.checked_sub(amount).ok_or_else(|| {
            ExchangeError::CustodyFailure(format!(
                "{}: {from} holds {from_balance}, cannot transfer {amount}",
                self.symbol
            ))
        })?;
        ledger.balances.insert(from.clone(), debited);
        *ledger.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }
}

#[async_trait]
impl GoldAsset for InMemoryToken {
    async fn transfer_from(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError> {
        self.transfer(from, to, amount).await
    }

    async fn balance_of(&self, holder: &AccountId) -> Result<u128, ExchangeError> {
        Ok(self.balance(holder).await)
    }
}

#[async_trait]
impl StableAsset for InMemoryToken {
    async fn transfer_from(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError> {
        self.transfer(from, to, amount).await
    }

    async fn mint(&self, to: &AccountId, amount: u128) -> Result<(), ExchangeError> {
        let mut ledger = self.ledger.write().await;
        ledger.total_supply = ledger.total_supply.checked_add(amount).ok_or_else(|| {
            ExchangeError::CustodyFailure(format!("{}: mint overflows supply", self.symbol))
        })?;
        *ledger.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    async fn burn(&self, from: &AccountId, amount: u128) -> Result<(), ExchangeError> {
        let mut ledger = self.ledger.write().await;
        let held = ledger.balances.get(from).copied().unwrap_or(0);
        let left = held.checked_sub(amount).ok_or_else(|| {
            ExchangeError::CustodyFailure(format!(
                "{}: {from} holds {held}, cannot burn {amount}",
                self.symbol
            ))
        })?;
        ledger.balances.insert(from.clone(), left);
        ledger.total_supply -= amount;
        Ok(())
    }

    async fn balance_of(&self, holder: &AccountId) -> Result<u128, ExchangeError> {
        Ok(self.balance(holder).await)
    }
}

/// Reserve custody holding gold in its own token account.
pub struct InMemoryReserve {
    account: AccountId,
    gold: Arc<InMemoryToken>,
}

impl InMemoryReserve {
    pub fn new(account: AccountId, gold: Arc<InMemoryToken>) -> Self {
        Self { account, gold }
    }
}

#[async_trait]
impl ReserveCustody for InMemoryReserve {
    fn account_id(&self) -> AccountId {
        self.account.clone()
    }

    async fn gold_balance(&self) -> Result<u128, ExchangeError> {
        Ok(self.gold.balance(&self.account).await)
    }

    async fn release_gold(&self, to: &AccountId, amount: u128) -> Result<(), ExchangeError> {
        self.gold.transfer(&self.account, to, amount).await
    }
}

/// Single-owner access control.
pub struct OwnerAccess {
    owner: AccountId,
}

impl OwnerAccess {
    pub fn new(owner: AccountId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl AccessControl for OwnerAccess {
    async fn is_owner(&self, caller: &AccountId) -> Result<bool, ExchangeError> {
        Ok(caller == &self.owner)
    }
}

struct Slots {
    oracle: Arc<dyn RateOracle>,
    reserve: Arc<dyn ReserveCustody>,
    gold: Arc<dyn GoldAsset>,
    stable: Arc<dyn StableAsset>,
    access: Arc<dyn AccessControl>,
}

/// Registry whose slots can be swapped at runtime; every resolution reads
/// the slot afresh, so a swap is visible on the next engine call.
pub struct InMemoryRegistry {
    slots: RwLock<Slots>,
}

impl InMemoryRegistry {
    pub fn new(
        oracle: Arc<dyn RateOracle>,
        reserve: Arc<dyn ReserveCustody>,
        gold: Arc<dyn GoldAsset>,
        stable: Arc<dyn StableAsset>,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            slots: RwLock::new(Slots {
                oracle,
                reserve,
                gold,
                stable,
                access,
            }),
        }
    }

    pub async fn swap_oracle(&self, oracle: Arc<dyn RateOracle>) {
        self.slots.write().await.oracle = oracle;
    }

    pub async fn swap_reserve(&self, reserve: Arc<dyn ReserveCustody>) {
        self.slots.write().await.reserve = reserve;
    }

    pub async fn swap_gold_asset(&self, gold: Arc<dyn GoldAsset>) {
        self.slots.write().await.gold = gold;
    }

    pub async fn swap_stable_asset(&self, stable: Arc<dyn StableAsset>) {
        self.slots.write().await.stable = stable;
    }

    pub async fn swap_access_control(&self, access: Arc<dyn AccessControl>) {
        self.slots.write().await.access = access;
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn oracle(&self) -> Arc<dyn RateOracle> {
        self.slots.read().await.oracle.clone()
    }

    async fn reserve(&self) -> Arc<dyn ReserveCustody> {
        self.slots.read().await.reserve.clone()
    }

    async fn gold_asset(&self) -> Arc<dyn GoldAsset> {
        self.slots.read().await.gold.clone()
    }

    async fn stable_asset(&self) -> Arc<dyn StableAsset> {
        self.slots.read().await.stable.clone()
    }

    async fn access_control(&self) -> Arc<dyn AccessControl> {
        self.slots.read().await.access.clone()
    }
}
