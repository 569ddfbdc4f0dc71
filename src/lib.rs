//! Aurex - gold/stable constant-product exchange engine
//! Bucket sizes are periodically re-anchored to an external price oracle

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use domain::buckets::{BucketPair, BucketState};
pub use domain::exchange::{ExchangeEngine, ExchangeEvent};
pub use shared::fixed::Fixed;
pub use shared::types::{AccountId, ExchangeConfig};
