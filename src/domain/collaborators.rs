//! Collaborator interfaces consumed by the exchange engine.
//!
//! The engine never owns oracle rates, reserve balances or token ledgers;
//! it only observes and instructs them through these traits. Handles are
//! resolved through [`Registry`] on every call, never cached, so swapping
//! a collaborator takes effect on the very next operation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::shared::errors::ExchangeError;
use crate::shared::types::AccountId;

/// Median exchange-rate oracle for the gold/stable pair.
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Count of currently-valid rate reports.
    async fn num_rates(&self) -> Result<u64, ExchangeError>;

    /// Timestamp (unix seconds) of the most recent report backing the median.
    async fn median_timestamp(&self) -> Result<u64, ExchangeError>;

    /// Median rate as a (numerator, denominator) fraction: stable per gold.
    async fn median_rate(&self) -> Result<(u128, u128), ExchangeError>;
}

/// Custody of the gold reserve backing the stable asset.
#[async_trait]
pub trait ReserveCustody: Send + Sync {
    /// Account that holds the custodied gold; transfers into the reserve
    /// are addressed here.
    fn account_id(&self) -> AccountId;

    /// Live gold balance of the reserve.
    async fn gold_balance(&self) -> Result<u128, ExchangeError>;

    /// Release custodied gold to a recipient.
    async fn release_gold(&self, to: &AccountId, amount: u128) -> Result<(), ExchangeError>;
}

/// Transfer-style gold token.
#[async_trait]
pub trait GoldAsset: Send + Sync {
    async fn transfer_from(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError>;

    async fn balance_of(&self, holder: &AccountId) -> Result<u128, ExchangeError>;
}

/// Mintable/burnable stable token.
#[async_trait]
pub trait StableAsset: Send + Sync {
    async fn transfer_from(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), ExchangeError>;

    async fn mint(&self, to: &AccountId, amount: u128) -> Result<(), ExchangeError>;

    /// Destroy tokens held by `from`.
    async fn burn(&self, from: &AccountId, amount: u128) -> Result<(), ExchangeError>;

    async fn balance_of(&self, holder: &AccountId) -> Result<u128, ExchangeError>;
}

/// Gate for owner-only administrative operations.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn is_owner(&self, caller: &AccountId) -> Result<bool, ExchangeError>;
}

/// Resolves logical collaborator identities to live handles.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn oracle(&self) -> Arc<dyn RateOracle>;
    async fn reserve(&self) -> Arc<dyn ReserveCustody>;
    async fn gold_asset(&self) -> Arc<dyn GoldAsset>;
    async fn stable_asset(&self) -> Arc<dyn StableAsset>;
    async fn access_control(&self) -> Arc<dyn AccessControl>;
}
