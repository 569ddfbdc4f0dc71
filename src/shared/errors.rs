//! Error handling for the engine

use thiserror::Error;

use crate::shared::types::AccountId;

/// Fixed-point arithmetic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("arithmetic underflow in {0}")]
    Underflow(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("invalid decimal literal: {0}")]
    InvalidDecimal(String),
}

/// Exchange-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("slippage exceeded: computed buy amount {actual} below minimum {minimum}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("custody operation failed: {0}")]
    CustodyFailure(String),

    #[error("unauthorized caller: {0}")]
    Unauthorized(AccountId),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("exchange error: {0}")]
    ExchangeError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self {
        AppError::ExchangeError(err.to_string())
    }
}

impl From<MathError> for AppError {
    fn from(err: MathError) -> Self {
        AppError::Unknown(err.to_string())
    }
}
