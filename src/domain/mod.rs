//! Domain layer - core business logic

pub mod buckets;
pub mod collaborators;
pub mod exchange;
pub mod pricing;
