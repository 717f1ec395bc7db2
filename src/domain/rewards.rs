//! Fee-income accounting: per-share dividend accumulators for holders and
//! the time-locked FIFO reward queue owned by the pool creator.

use crate::domain::math::{to_u128, U256};
use crate::domain::types::*;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Lock horizon applied to newly settled dividends and new reward epochs
pub fn lock_until(now: Timestamp) -> Timestamp {
    now + Duration::weeks(LOCK_PERIOD_WEEKS)
}

/// A holder's liquidity claim and lazily settled dividend state
#[derive(Debug, Clone, Default)]
pub struct LiquidityPosition {
    /// Liquidity shares held
    pub share_balance: u128,
    /// Accumulator value at last settlement, canonically first side
    pub checkpoint_base: U256,
    /// Accumulator value at last settlement, canonically second side
    pub checkpoint_quote: U256,
    /// Settled but not yet withdrawn dividends, canonically first side
    pub pending_base: u128,
    /// Settled but not yet withdrawn dividends, canonically second side
    pub pending_quote: u128,
    /// Earliest time pending dividends may be withdrawn
    pub dividend_unlock_time: Option<Timestamp>,
}

/// Magnified per-share running totals of fixed-fee income.
///
/// Each accrual adds `fee × DIVIDEND_PRECISION / total_shares`; a holder's
/// owed amount is their balance times the accumulator delta since their
/// checkpoint, de-magnified. This settles any holder lazily without
/// iterating the position map.
#[derive(Debug, Clone, Default)]
pub struct DividendAccumulator {
    acc_base: U256,
    acc_quote: U256,
}

impl DividendAccumulator {
    /// Creates a zeroed accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Current magnified accumulator for a side
    pub fn value(&self, side: PairSide) -> U256 {
        match side {
            PairSide::Base => self.acc_base,
            PairSide::Quote => self.acc_quote,
        }
    }

    /// Adds fixed-fee income for a side. Skipped while no shares exist.
    pub fn accrue(&mut self, side: PairSide, fee_amount: u128, total_shares: u128) {
        if total_shares == 0 || fee_amount == 0 {
            return;
        }
        let magnified =
            U256::from(fee_amount) * U256::from(DIVIDEND_PRECISION) / U256::from(total_shares);
        match side {
            PairSide::Base => self.acc_base = self.acc_base + magnified,
            PairSide::Quote => self.acc_quote = self.acc_quote + magnified,
        }
    }

    /// Settles a position against the current accumulators.
    ///
    /// Owed amounts are added to the pending balances and the withdrawal
    /// lock is extended to `now + LOCK_PERIOD` when anything accrued; the
    /// checkpoints always advance. Must run before any change to the
    /// position's share balance.
    pub fn settle(&self, position: &mut LiquidityPosition, now: Timestamp) -> AmmResult<()> {
        let owed_base = self.owed(position.share_balance, position.checkpoint_base, PairSide::Base)?;
        let owed_quote =
            self.owed(position.share_balance, position.checkpoint_quote, PairSide::Quote)?;

        if owed_base > 0 || owed_quote > 0 {
            position.pending_base = position
                .pending_base
                .checked_add(owed_base)
                .ok_or(AmmError::MathOverflow)?;
            position.pending_quote = position
                .pending_quote
                .checked_add(owed_quote)
                .ok_or(AmmError::MathOverflow)?;
            let extended = lock_until(now);
            position.dividend_unlock_time = Some(match position.dividend_unlock_time {
                Some(current) if current > extended => current,
                _ => extended,
            });
        }
        position.checkpoint_base = self.acc_base;
        position.checkpoint_quote = self.acc_quote;
        Ok(())
    }

    fn owed(&self, balance: u128, checkpoint: U256, side: PairSide) -> AmmResult<u128> {
        let delta = self.value(side) - checkpoint;
        to_u128(U256::from(balance) * delta / U256::from(DIVIDEND_PRECISION))
    }
}

/// One time-locked batch of creator reward fees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEpoch {
    /// Accrued amount, drained to zero on withdrawal
    pub amount: u128,
    /// Time at which the epoch becomes collectible
    pub unlock_time: Timestamp,
}

/// Append-only FIFO queue of reward epochs with a lazy consumption cursor.
///
/// Epochs are consumed strictly in creation order: collection stops at the
/// first still-locked epoch even when later epochs have already unlocked.
#[derive(Debug, Clone, Default)]
pub struct RewardQueue {
    epochs: Vec<RewardEpoch>,
    next_withdrawable: usize,
}

impl RewardQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes adjustable-fee income into the queue.
    ///
    /// While the newest epoch is still locked its amount grows in place;
    /// otherwise a new epoch is appended with a fresh two-week lock.
    pub fn accrue(&mut self, amount: u128, now: Timestamp) {
        if amount == 0 {
            return;
        }
        if let Some(last) = self.epochs.last_mut() {
            if last.unlock_time > now {
                last.amount = last.amount.saturating_add(amount);
                return;
            }
        }
        self.epochs.push(RewardEpoch {
            amount,
            unlock_time: lock_until(now),
        });
    }

    /// Drains unlocked epochs from the cursor forward, strictly in order.
    ///
    /// Returns the summed amount; zero when the cursor is blocked by a
    /// locked epoch or the queue is exhausted.
    pub fn collect(&mut self, now: Timestamp) -> u128 {
        let mut total = 0u128;
        while self.next_withdrawable < self.epochs.len() {
            let epoch = &mut self.epochs[self.next_withdrawable];
            if epoch.unlock_time > now {
                break;
            }
            total = total.saturating_add(epoch.amount);
            epoch.amount = 0;
            self.next_withdrawable += 1;
        }
        total
    }

    /// All epochs ever created, drained ones included
    pub fn epochs(&self) -> &[RewardEpoch] {
        &self.epochs
    }

    /// Index of the earliest epoch not yet fully withdrawn
    pub fn cursor(&self) -> usize {
        self.next_withdrawable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_accrue_skipped_without_shares() {
        let mut acc = DividendAccumulator::new();
        acc.accrue(PairSide::Base, 1_000, 0);
        assert_eq!(acc.value(PairSide::Base), U256::zero());
    }

    #[test]
    fn test_settle_credits_pro_rata() {
        let now = Utc::now();
        let mut acc = DividendAccumulator::new();
        // 100 units of fee over 1_000 shares = 0.1 per share
        acc.accrue(PairSide::Base, 100, 1_000);

        let mut position = LiquidityPosition {
            share_balance: 250,
            ..Default::default()
        };
        acc.settle(&mut position, now).unwrap();

        assert_eq!(position.pending_base, 25);
        assert_eq!(position.pending_quote, 0);
        assert_eq!(position.checkpoint_base, acc.value(PairSide::Base));
        assert_eq!(position.dividend_unlock_time, Some(lock_until(now)));
    }

    #[test]
    fn test_settle_without_income_only_advances_checkpoints() {
        let now = Utc::now();
        let acc = DividendAccumulator::new();
        let mut position = LiquidityPosition {
            share_balance: 500,
            ..Default::default()
        };
        acc.settle(&mut position, now).unwrap();
        assert_eq!(position.pending_base, 0);
        assert_eq!(position.dividend_unlock_time, None);
    }

    #[test]
    fn test_settle_keeps_later_unlock() {
        let now = Utc::now();
        let later = now + Duration::weeks(10);
        let mut acc = DividendAccumulator::new();
        acc.accrue(PairSide::Quote, 1_000, 100);

        let mut position = LiquidityPosition {
            share_balance: 100,
            dividend_unlock_time: Some(later),
            ..Default::default()
        };
        acc.settle(&mut position, now).unwrap();
        assert_eq!(position.dividend_unlock_time, Some(later));
    }

    #[test]
    fn test_double_settle_does_not_double_count() {
        let now = Utc::now();
        let mut acc = DividendAccumulator::new();
        acc.accrue(PairSide::Base, 100, 1_000);

        let mut position = LiquidityPosition {
            share_balance: 100,
            ..Default::default()
        };
        acc.settle(&mut position, now).unwrap();
        let first = position.pending_base;
        acc.settle(&mut position, now).unwrap();
        assert_eq!(position.pending_base, first);
    }

    #[test]
    fn test_reward_queue_grows_locked_epoch_in_place() {
        let now = Utc::now();
        let mut queue = RewardQueue::new();
        queue.accrue(10, now);
        queue.accrue(5, now + Duration::days(1));

        assert_eq!(queue.epochs().len(), 1);
        assert_eq!(queue.epochs()[0].amount, 15);
    }

    #[test]
    fn test_reward_queue_appends_after_unlock() {
        let now = Utc::now();
        let mut queue = RewardQueue::new();
        queue.accrue(10, now);
        let after_unlock = now + Duration::weeks(3);
        queue.accrue(7, after_unlock);

        assert_eq!(queue.epochs().len(), 2);
        assert_eq!(queue.epochs()[1].amount, 7);
        assert_eq!(queue.epochs()[1].unlock_time, lock_until(after_unlock));
    }

    #[test]
    fn test_reward_queue_strict_fifo_blocking() {
        // Epoch 1 unlocks later than epoch 2 would "seem" available: the
        // cursor must stop at the first locked epoch and collect nothing.
        let base = Utc::now();
        let mut queue = RewardQueue::new();
        queue.epochs = vec![
            RewardEpoch {
                amount: 100,
                unlock_time: base + Duration::weeks(4),
            },
            RewardEpoch {
                amount: 50,
                unlock_time: base + Duration::weeks(1),
            },
        ];

        let probe = base + Duration::weeks(2);
        assert_eq!(queue.collect(probe), 0);
        assert_eq!(queue.cursor(), 0);

        // Once the head unlocks, both drain in order.
        let later = base + Duration::weeks(5);
        assert_eq!(queue.collect(later), 150);
        assert_eq!(queue.cursor(), 2);
        assert!(queue.epochs().iter().all(|e| e.amount == 0));
    }

    #[test]
    fn test_reward_queue_collect_is_idempotent() {
        let now = Utc::now();
        let mut queue = RewardQueue::new();
        queue.accrue(42, now);
        let later = now + Duration::weeks(3);
        assert_eq!(queue.collect(later), 42);
        assert_eq!(queue.collect(later), 0);
    }
}
