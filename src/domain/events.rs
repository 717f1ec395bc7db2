use crate::domain::types::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Observable side effects emitted by a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolEvent {
    /// A pool was created for the pair
    PoolCreated {
        /// Canonical pair identity
        pair: PairKey,
        /// Account that created the pool
        creator: AccountId,
        /// Creation time
        timestamp: Timestamp,
    },
    /// Liquidity shares were minted against a deposit
    LiquidityMinted {
        /// Canonical pair identity
        pair: PairKey,
        /// Share recipient
        recipient: AccountId,
        /// Deposit on the canonically first side
        amount_base: u128,
        /// Deposit on the canonically second side
        amount_quote: u128,
        /// Shares minted to the recipient
        shares: u128,
        /// Commit time
        timestamp: Timestamp,
    },
    /// Liquidity shares were burned for the underlying assets
    LiquidityBurned {
        /// Canonical pair identity
        pair: PairKey,
        /// Asset recipient
        recipient: AccountId,
        /// Amount paid out on the canonically first side
        amount_base: u128,
        /// Amount paid out on the canonically second side
        amount_quote: u128,
        /// Shares burned
        shares: u128,
        /// Commit time
        timestamp: Timestamp,
    },
    /// A swap committed against the reserves
    SwapExecuted {
        /// Canonical pair identity
        pair: PairKey,
        /// Output recipient
        recipient: AccountId,
        /// Input observed on the canonically first side
        in_base: u128,
        /// Input observed on the canonically second side
        in_quote: u128,
        /// Output sent on the canonically first side
        out_base: u128,
        /// Output sent on the canonically second side
        out_quote: u128,
        /// Committed reserve, canonically first side
        reserve_base: u128,
        /// Committed reserve, canonically second side
        reserve_quote: u128,
        /// Commit time
        timestamp: Timestamp,
    },
    /// Reserves were reconciled to actual balances
    ReservesSynced {
        /// Canonical pair identity
        pair: PairKey,
        /// Committed reserve, canonically first side
        reserve_base: u128,
        /// Committed reserve, canonically second side
        reserve_quote: u128,
        /// Commit time
        timestamp: Timestamp,
    },
    /// The creator-adjustable fee changed
    FeeChanged {
        /// Canonical pair identity
        pair: PairKey,
        /// Effective adjustable fee after clamping, in basis points
        adjustable_fee_bps: u128,
        /// Change time
        timestamp: Timestamp,
    },
    /// The creator collected unlocked reward epochs
    RewardEpochWithdrawn {
        /// Canonical pair identity
        pair: PairKey,
        /// Pool creator
        creator: AccountId,
        /// Collected amount, canonically first side
        amount_base: u128,
        /// Collected amount, canonically second side
        amount_quote: u128,
        /// Withdrawal time
        timestamp: Timestamp,
    },
    /// A holder collected pending dividends
    DividendsWithdrawn {
        /// Canonical pair identity
        pair: PairKey,
        /// Dividend holder
        account: AccountId,
        /// Collected amount, canonically first side
        amount_base: u128,
        /// Collected amount, canonically second side
        amount_quote: u128,
        /// Withdrawal time
        timestamp: Timestamp,
    },
    /// A price oracle was bound to the pool
    OracleBound {
        /// Canonical pair identity
        pair: PairKey,
        /// Bind time
        timestamp: Timestamp,
    },
}

impl PoolEvent {
    /// Timestamp carried by this event
    pub fn timestamp(&self) -> Timestamp {
        match self {
            PoolEvent::PoolCreated { timestamp, .. }
            | PoolEvent::LiquidityMinted { timestamp, .. }
            | PoolEvent::LiquidityBurned { timestamp, .. }
            | PoolEvent::SwapExecuted { timestamp, .. }
            | PoolEvent::ReservesSynced { timestamp, .. }
            | PoolEvent::FeeChanged { timestamp, .. }
            | PoolEvent::RewardEpochWithdrawn { timestamp, .. }
            | PoolEvent::DividendsWithdrawn { timestamp, .. }
            | PoolEvent::OracleBound { timestamp, .. } => *timestamp,
        }
    }
}

/// Observable side effects emitted by the price oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OracleEvent {
    /// The blended price advanced for a pair
    PriceUpdated {
        /// Canonical pair identity
        pair: PairKey,
        /// Trade price oriented to canonical order (quote per base)
        price: Decimal,
        /// Global update counter after this update
        update_count: u64,
    },
    /// A trade entry was appended for a pair
    TransactionRecorded {
        /// Canonical pair identity
        pair: PairKey,
        /// Buy/sell classification in canonical orientation
        is_buy: bool,
        /// Input amount of the trade
        amount_in: u128,
        /// Received amount of the trade
        amount_received: u128,
        /// Global update counter after this update
        update_count: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PairKey {
        PairKey::new(AssetId("A".into()), AssetId("B".into())).unwrap()
    }

    #[test]
    fn test_event_timestamp_accessor() {
        let now = chrono::Utc::now();
        let event = PoolEvent::FeeChanged {
            pair: key(),
            adjustable_fee_bps: 30,
            timestamp: now,
        };
        assert_eq!(event.timestamp(), now);
    }

    #[test]
    fn test_events_round_trip_json() {
        let now = chrono::Utc::now();
        let event = PoolEvent::SwapExecuted {
            pair: key(),
            recipient: AccountId("trader".into()),
            in_base: 100,
            in_quote: 0,
            out_base: 0,
            out_quote: 90,
            reserve_base: 1_100,
            reserve_quote: 910,
            timestamp: now,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PoolEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
