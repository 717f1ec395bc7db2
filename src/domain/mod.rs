//! Domain layer containing core business logic and entities
//!
//! This module contains the core domain entities and business logic for the
//! constant-product market maker, including pools, the token ledger, fee
//! accounting and the TWAP price oracle.

/// Pool and oracle events
pub mod events;
/// Fungible-asset balances and allowances
pub mod ledger;
/// Wide-integer arithmetic helpers
pub mod math;
/// Windowed TWAP price oracle with trade records
pub mod oracle;
/// Constant-product pair and swap engine
pub mod pair;
/// Pool directory and factory configuration
pub mod registry;
/// Dividend accumulators and reward epoch queues
pub mod rewards;
/// Core types and primitives
pub mod types;

pub use events::*;
pub use types::*;

pub use ledger::TokenLedger;
pub use math::{integer_sqrt, mul_div, reserve_product, U256};
pub use oracle::{
    PriceOracle, PriceRecord, PriceSample, ThreadSafeOracle, TradeEntry, TransactionRecord,
};
pub use pair::{Pair, SwapCallback, SwapCallbackContext, ThreadSafePair};
pub use registry::{FactoryConfig, PoolRegistry, SharedFactoryConfig};
pub use rewards::{DividendAccumulator, LiquidityPosition, RewardEpoch, RewardQueue};
