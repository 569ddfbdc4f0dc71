//! Application layer - services and CLI commands

pub mod commands;
pub mod services;
