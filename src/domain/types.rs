use serde::{Deserialize, Serialize};
use std::fmt;

/// Fungible asset identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AssetId {
    /// Returns true if the identifier is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Account identifier for holders, creators and the pools themselves
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical unordered asset pair: the lexicographically lower asset is
/// always `base`, regardless of the order the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    /// Canonically first asset
    pub base: AssetId,
    /// Canonically second asset
    pub quote: AssetId,
}

impl PairKey {
    /// Builds the canonical key for two assets.
    ///
    /// Rejects empty identifiers and identical assets on both sides.
    pub fn new(a: AssetId, b: AssetId) -> AmmResult<Self> {
        if a.is_empty() || b.is_empty() {
            return Err(AmmError::InvalidAsset);
        }
        if a == b {
            return Err(AmmError::IdenticalAssets);
        }
        if a < b {
            Ok(Self { base: a, quote: b })
        } else {
            Ok(Self { base: b, quote: a })
        }
    }

    /// Returns true if `asset` is the canonically first asset of this key
    pub fn is_base(&self, asset: &AssetId) -> bool {
        &self.base == asset
    }

    /// Returns true if the key covers the given asset
    pub fn contains(&self, asset: &AssetId) -> bool {
        &self.base == asset || &self.quote == asset
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Which side of a pair an amount refers to, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairSide {
    /// Canonically first asset
    Base,
    /// Canonically second asset
    Quote,
}

impl fmt::Display for PairSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairSide::Base => write!(f, "BASE"),
            PairSide::Quote => write!(f, "QUOTE"),
        }
    }
}

/// Timestamp for pool and oracle events
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Basis-point denominator (10_000 bps = 100%)
pub const FEE_DENOMINATOR: u128 = 10_000;

/// Fixed liquidity-provider dividend fee, in basis points
pub const FIXED_FEE_BPS: u128 = 50;

/// Lower clamp for the creator-adjustable fee, in basis points
pub const MIN_ADJUSTABLE_FEE_BPS: u128 = 10;

/// Upper clamp for the creator-adjustable fee, in basis points
pub const MAX_ADJUSTABLE_FEE_BPS: u128 = 50;

/// Adjustable fee a pool starts with, in basis points
pub const DEFAULT_ADJUSTABLE_FEE_BPS: u128 = 20;

/// Liquidity shares permanently allocated to the burn account on first mint
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

/// Reserves are bounded to 112 bits; anything beyond is rejected
pub const MAX_RESERVE: u128 = (1u128 << 112) - 1;

/// Magnification factor for the per-share dividend accumulators
pub const DIVIDEND_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Lock applied to pending dividends and new reward epochs
pub const LOCK_PERIOD_WEEKS: i64 = 2;

/// Account that receives the permanently locked minimum liquidity
pub const BURN_ACCOUNT: &str = "burn";

/// Pool and oracle errors
#[derive(Debug, thiserror::Error)]
pub enum AmmError {
    /// Empty or otherwise unusable asset identifier
    #[error("Invalid asset identifier")]
    InvalidAsset,

    /// The same asset was supplied for both sides of a pair
    #[error("Identical assets on both sides of the pair")]
    IdenticalAssets,

    /// A pool for the pair already exists
    #[error("Pool already exists for pair {0}")]
    PoolExists(String),

    /// No pool registered for the pair
    #[error("Unknown pool for pair {0}")]
    UnknownPool(String),

    /// A committed reserve would exceed the 112-bit bound
    #[error("Reserve overflow: {0} exceeds the 112-bit bound")]
    ReserveOverflow(u128),

    /// The fee-adjusted constant-product check failed
    #[error("Constant-product invariant violated")]
    InvariantViolation,

    /// Not enough liquidity minted, burned or available for the request
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    /// Swap received no input on either side
    #[error("Insufficient input amount")]
    InsufficientInput,

    /// Requested or computed output amount is zero or too large
    #[error("Insufficient output amount")]
    InsufficientOutput,

    /// An account balance cannot cover the requested movement
    #[error("Insufficient balance: account {account} holds {held}, needs {needed}")]
    InsufficientBalance {
        /// Account that was debited
        account: String,
        /// Balance actually held
        held: u128,
        /// Amount the operation needed
        needed: u128,
    },

    /// Caller lacks the role required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Funds are still time-locked
    #[error("Locked until {0}")]
    Locked(Timestamp),

    /// Nothing collectible at this time
    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    /// Oracle data is older than the staleness bound allows
    #[error("Price data stale: {staleness} updates old, bound is {bound}")]
    StalePrice {
        /// Observed staleness in update counts
        staleness: u64,
        /// Maximum accepted staleness
        bound: u64,
    },

    /// No price has been recorded for the pair yet
    #[error("No price data for pair {0}")]
    NoPriceData(String),

    /// A mutating entry point was re-entered from the swap callback
    #[error("Reentrant call rejected")]
    Reentrancy,

    /// The combined fee rate fell outside the accepted range
    #[error("Fee rate out of range: {0} bps")]
    FeeOutOfRange(u128),

    /// Intermediate arithmetic overflowed its width
    #[error("Arithmetic overflow")]
    MathOverflow,
}

/// Result type for pool and oracle operations
pub type AmmResult<T> = Result<T, AmmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_canonical_order() {
        let key = PairKey::new(AssetId("WETH".into()), AssetId("DAI".into())).unwrap();
        assert_eq!(key.base, AssetId("DAI".into()));
        assert_eq!(key.quote, AssetId("WETH".into()));

        let reversed = PairKey::new(AssetId("DAI".into()), AssetId("WETH".into())).unwrap();
        assert_eq!(key, reversed);
    }

    #[test]
    fn test_pair_key_rejects_identical_assets() {
        let result = PairKey::new(AssetId("DAI".into()), AssetId("DAI".into()));
        assert!(matches!(result, Err(AmmError::IdenticalAssets)));
    }

    #[test]
    fn test_pair_key_rejects_empty_asset() {
        let result = PairKey::new(AssetId(String::new()), AssetId("DAI".into()));
        assert!(matches!(result, Err(AmmError::InvalidAsset)));
    }

    #[test]
    fn test_pair_side_lookup() {
        let key = PairKey::new(AssetId("A".into()), AssetId("B".into())).unwrap();
        assert!(key.is_base(&AssetId("A".into())));
        assert!(!key.is_base(&AssetId("B".into())));
        assert!(key.contains(&AssetId("B".into())));
        assert!(!key.contains(&AssetId("C".into())));
    }

    #[test]
    fn test_reserve_bound_is_112_bits() {
        assert_eq!(MAX_RESERVE, (1u128 << 112) - 1);
        assert!(MAX_RESERVE.checked_mul(1).is_some());
    }
}
