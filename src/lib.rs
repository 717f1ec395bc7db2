//! # Constant-Product AMM
//!
//! A thread-safe constant-product market maker implementing:
//! - Liquidity pools with mint/burn/swap against committed reserves
//! - Swap fees split between holder dividends and time-locked creator rewards
//! - Flash-swap callbacks with reentrancy protection
//! - A windowed TWAP price oracle with sparse history and trade records
//!
//! ## Architecture
//!
//! The crate follows domain-driven design principles with clear separation of
//! concerns:
//!
//! - **Domain**: Core business logic (pools, ledger, fee accounting, oracle)
//! - **Utils**: Logging configuration
//!
//! ## Thread Safety
//!
//! Shared structures use `std::sync::RwLock` for concurrent access:
//! - Multiple concurrent readers for quotes and reserve queries
//! - Single writer exclusion per pool for mutating operations
//! - Independent pools never contend with each other
//!
//! ## Arithmetic
//!
//! Amounts are `u128` with reserves bounded to 112 bits; intermediate
//! products are computed in 256 bits and every division floors, so the
//! constant product never decreases from rounding alone.

pub mod domain;

/// Utilities for logging
pub mod utils;

// Re-export commonly used types for convenience
pub use domain::{
    events::*,
    ledger::TokenLedger,
    oracle::{PriceOracle, ThreadSafeOracle},
    pair::{Pair, SwapCallback, SwapCallbackContext, ThreadSafePair},
    registry::{FactoryConfig, PoolRegistry, SharedFactoryConfig},
    types::*,
};

/// Main result type for the market maker
pub type Result<T> = std::result::Result<T, AmmError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
