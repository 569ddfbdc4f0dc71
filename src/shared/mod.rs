//! Shared components used across all layers

pub mod config;
pub mod errors;
pub mod fixed;
pub mod types;
