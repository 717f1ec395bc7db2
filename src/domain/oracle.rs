//! Spot-price oracle fed by pool trade notifications.
//!
//! State is keyed by the canonical (unordered) pair identity; callers may
//! supply either asset order and price/amount roles are inverted
//! transparently. The blended price is a window-normalized moving average:
//! each update decays the stored value by `(W - elapsed) / W` and mixes the
//! new trade price in at weight `elapsed / W`, where elapsed is measured in
//! global update counts and capped at the window length.

use crate::domain::events::OracleEvent;
use crate::domain::types::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Blend window length, in global update counts
pub const TWAP_WINDOW: u64 = 24;

/// Sparse history sampling interval, in per-pair update counts
pub const HISTORY_INTERVAL: u64 = 10;

/// Maximum accepted staleness for a TWAP query, in global update counts
pub const MAX_STALENESS: u64 = 100;

/// One sparse price history sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Blended price at sampling time, canonical orientation
    pub price: Decimal,
    /// Global update counter when the sample was taken
    pub update_count: u64,
}

/// Blended price state for one canonical pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Window-normalized blended price, quote per base
    pub cumulative_price: Decimal,
    /// Raw price of the most recent trade, quote per base
    pub last_price: Decimal,
    /// Number of updates recorded for this pair
    pub update_count: u64,
    /// Global update counter at the most recent update
    pub last_update_count: u64,
    /// Sparse price history, one sample every `HISTORY_INTERVAL` updates
    pub history: Vec<PriceSample>,
}

/// One recorded trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEntry {
    /// True when the canonically first asset was bought
    pub is_buy: bool,
    /// Trade input amount
    pub amount_in: u128,
    /// Trade received amount
    pub amount_received: u128,
    /// Global update counter when the trade was recorded
    pub update_count: u64,
}

/// Trade history for one canonical pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Number of recorded buys of the canonically first asset
    pub buy_count: u64,
    /// Number of recorded sells of the canonically first asset
    pub sell_count: u64,
    /// Global update counter at the most recent entry
    pub last_update_count: u64,
    /// All recorded trades, oldest first
    pub entries: Vec<TradeEntry>,
}

/// Price oracle driven by a single authorized pool caller
#[derive(Debug)]
pub struct PriceOracle {
    authorized_caller: AccountId,
    update_count: u64,
    prices: HashMap<PairKey, PriceRecord>,
    transactions: HashMap<PairKey, TransactionRecord>,
    events: Vec<OracleEvent>,
}

impl PriceOracle {
    /// Creates an oracle that only accepts updates from `authorized_caller`
    pub fn new(authorized_caller: AccountId) -> Self {
        Self {
            authorized_caller,
            update_count: 0,
            prices: HashMap::new(),
            transactions: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Global update counter across all pairs
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Consumes one trade notification.
    ///
    /// `price` is the executed price expressed as units of `asset_out` per
    /// unit of `asset_in`; it is re-oriented to the canonical pair order
    /// before blending. `is_buy` classifies the trade as a purchase of the
    /// canonically first asset.
    #[allow(clippy::too_many_arguments)]
    pub fn update_price(
        &mut self,
        caller: &AccountId,
        asset_in: &AssetId,
        asset_out: &AssetId,
        price: Decimal,
        is_buy: bool,
        amount_in: u128,
        amount_received: u128,
    ) -> AmmResult<()> {
        if caller != &self.authorized_caller {
            return Err(AmmError::Forbidden(format!(
                "oracle updates restricted to {}",
                self.authorized_caller
            )));
        }
        let key = PairKey::new(asset_in.clone(), asset_out.clone())?;
        let canonical_price = if key.is_base(asset_in) {
            price
        } else if price.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE / price
        };

        self.update_count += 1;
        let global = self.update_count;

        let record = self.prices.entry(key.clone()).or_default();
        let elapsed = global - record.last_update_count;
        if record.update_count == 0 || elapsed >= TWAP_WINDOW {
            // First observation, or the data went stale for a full window:
            // the blend restarts from the new price.
            record.cumulative_price = canonical_price;
        } else {
            let window = Decimal::from(TWAP_WINDOW);
            let weight = Decimal::from(elapsed);
            record.cumulative_price = record.cumulative_price * (window - weight) / window
                + canonical_price * weight / window;
        }
        record.last_price = canonical_price;
        record.update_count += 1;
        record.last_update_count = global;
        if record.update_count % HISTORY_INTERVAL == 0 {
            record.history.push(PriceSample {
                price: record.cumulative_price,
                update_count: global,
            });
        }
        let blended = record.cumulative_price;

        let tx = self.transactions.entry(key.clone()).or_default();
        if is_buy {
            tx.buy_count += 1;
        } else {
            tx.sell_count += 1;
        }
        tx.last_update_count = global;
        tx.entries.push(TradeEntry {
            is_buy,
            amount_in,
            amount_received,
            update_count: global,
        });

        tracing::debug!(
            pair = %key,
            price = %canonical_price,
            blended = %blended,
            update_count = global,
            "oracle price updated"
        );
        self.events.push(OracleEvent::PriceUpdated {
            pair: key.clone(),
            price: canonical_price,
            update_count: global,
        });
        self.events.push(OracleEvent::TransactionRecorded {
            pair: key,
            is_buy,
            amount_in,
            amount_received,
            update_count: global,
        });
        Ok(())
    }

    /// Window-averaged price of `asset_a` expressed in `asset_b`.
    ///
    /// Fails when no trade has been recorded for the pair or when the last
    /// update is more than `MAX_STALENESS` global updates old. The blend is
    /// already normalized over the window, so a query immediately after an
    /// update (staleness zero) succeeds.
    pub fn get_twap(&self, asset_a: &AssetId, asset_b: &AssetId) -> AmmResult<Decimal> {
        let key = PairKey::new(asset_a.clone(), asset_b.clone())?;
        let record = self
            .prices
            .get(&key)
            .ok_or_else(|| AmmError::NoPriceData(key.to_string()))?;
        if record.update_count == 0 {
            return Err(AmmError::NoPriceData(key.to_string()));
        }
        let staleness = self.update_count - record.last_update_count;
        if staleness > MAX_STALENESS {
            return Err(AmmError::StalePrice {
                staleness,
                bound: MAX_STALENESS,
            });
        }
        self.orient_price(&key, asset_a, record.cumulative_price)
    }

    /// Sparse price history within the last `range_updates` global updates,
    /// oriented to the caller's asset order
    pub fn get_price_history(
        &self,
        asset_a: &AssetId,
        asset_b: &AssetId,
        range_updates: u64,
    ) -> AmmResult<Vec<PriceSample>> {
        let key = PairKey::new(asset_a.clone(), asset_b.clone())?;
        let record = self
            .prices
            .get(&key)
            .ok_or_else(|| AmmError::NoPriceData(key.to_string()))?;
        let min_count = self.update_count.saturating_sub(range_updates);
        let mut samples = Vec::new();
        for sample in record.history.iter().filter(|s| s.update_count >= min_count) {
            samples.push(PriceSample {
                price: self.orient_price(&key, asset_a, sample.price)?,
                update_count: sample.update_count,
            });
        }
        Ok(samples)
    }

    /// Trade history oriented to the caller's asset order: when the caller
    /// reverses the pair, buy/sell classifications flip accordingly
    pub fn get_transaction_data(
        &self,
        asset_a: &AssetId,
        asset_b: &AssetId,
    ) -> AmmResult<TransactionRecord> {
        let key = PairKey::new(asset_a.clone(), asset_b.clone())?;
        let record = self
            .transactions
            .get(&key)
            .ok_or_else(|| AmmError::NoPriceData(key.to_string()))?;
        if key.is_base(asset_a) {
            return Ok(record.clone());
        }
        let entries = record
            .entries
            .iter()
            .map(|e| TradeEntry {
                is_buy: !e.is_buy,
                ..e.clone()
            })
            .collect();
        Ok(TransactionRecord {
            buy_count: record.sell_count,
            sell_count: record.buy_count,
            last_update_count: record.last_update_count,
            entries,
        })
    }

    /// Raw canonical price record for a pair, if any
    pub fn price_record(&self, asset_a: &AssetId, asset_b: &AssetId) -> Option<&PriceRecord> {
        let key = PairKey::new(asset_a.clone(), asset_b.clone()).ok()?;
        self.prices.get(&key)
    }

    /// Drains the accumulated oracle events
    pub fn take_events(&mut self) -> Vec<OracleEvent> {
        std::mem::take(&mut self.events)
    }

    fn orient_price(&self, key: &PairKey, asset_a: &AssetId, price: Decimal) -> AmmResult<Decimal> {
        if key.is_base(asset_a) {
            Ok(price)
        } else if price.is_zero() {
            Err(AmmError::NoPriceData(key.to_string()))
        } else {
            Ok(Decimal::ONE / price)
        }
    }
}

/// Thread-safe wrapper around [`PriceOracle`]
#[derive(Debug, Clone)]
pub struct ThreadSafeOracle {
    inner: Arc<RwLock<PriceOracle>>,
}

impl ThreadSafeOracle {
    /// Creates a new thread-safe oracle for the given authorized caller
    pub fn new(authorized_caller: AccountId) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PriceOracle::new(authorized_caller))),
        }
    }

    /// Consume a trade notification with a write lock
    #[allow(clippy::too_many_arguments)]
    pub fn update_price(
        &self,
        caller: &AccountId,
        asset_in: &AssetId,
        asset_out: &AssetId,
        price: Decimal,
        is_buy: bool,
        amount_in: u128,
        amount_received: u128,
    ) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .update_price(
                caller,
                asset_in,
                asset_out,
                price,
                is_buy,
                amount_in,
                amount_received,
            )
    }

    /// Window-averaged price with a read lock
    pub fn get_twap(&self, asset_a: &AssetId, asset_b: &AssetId) -> AmmResult<Decimal> {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_twap(asset_a, asset_b)
    }

    /// Oriented sparse price history with a read lock
    pub fn get_price_history(
        &self,
        asset_a: &AssetId,
        asset_b: &AssetId,
        range_updates: u64,
    ) -> AmmResult<Vec<PriceSample>> {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_price_history(asset_a, asset_b, range_updates)
    }

    /// Oriented trade history with a read lock
    pub fn get_transaction_data(
        &self,
        asset_a: &AssetId,
        asset_b: &AssetId,
    ) -> AmmResult<TransactionRecord> {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_transaction_data(asset_a, asset_b)
    }

    /// Global update counter with a read lock
    pub fn update_count(&self) -> u64 {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .update_count()
    }

    /// Drains the accumulated oracle events with a write lock
    pub fn take_events(&self) -> Vec<OracleEvent> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .take_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool() -> AccountId {
        AccountId("pool".into())
    }

    fn a() -> AssetId {
        AssetId("AAA".into())
    }

    fn b() -> AssetId {
        AssetId("BBB".into())
    }

    fn push(oracle: &mut PriceOracle, price: Decimal) {
        oracle
            .update_price(&pool(), &a(), &b(), price, false, 100, 100)
            .unwrap();
    }

    #[test]
    fn test_unauthorized_caller_rejected() {
        let mut oracle = PriceOracle::new(pool());
        let result = oracle.update_price(
            &AccountId("mallory".into()),
            &a(),
            &b(),
            dec!(1.0),
            false,
            1,
            1,
        );
        assert!(matches!(result, Err(AmmError::Forbidden(_))));
    }

    #[test]
    fn test_first_update_sets_blend_to_price() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(2.0));
        assert_eq!(oracle.get_twap(&a(), &b()).unwrap(), dec!(2.0));
    }

    #[test]
    fn test_blend_moves_toward_new_price() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(2.0));
        push(&mut oracle, dec!(4.0));
        // elapsed = 1, window = 24: blend = 2 * 23/24 + 4 * 1/24
        let expected = dec!(2.0) * dec!(23) / dec!(24) + dec!(4.0) / dec!(24);
        assert_eq!(oracle.get_twap(&a(), &b()).unwrap(), expected);
    }

    #[test]
    fn test_stale_gap_resets_blend() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(2.0));
        // Unrelated pairs advance the global counter past the window.
        let c = AssetId("CCC".into());
        for _ in 0..TWAP_WINDOW {
            oracle
                .update_price(&pool(), &a(), &c, dec!(1.0), false, 1, 1)
                .unwrap();
        }
        push(&mut oracle, dec!(10.0));
        assert_eq!(oracle.get_twap(&a(), &b()).unwrap(), dec!(10.0));
    }

    #[test]
    fn test_twap_succeeds_at_zero_staleness() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(3.0));
        // The most recent update is this pair's own: staleness is zero.
        assert!(oracle.get_twap(&a(), &b()).is_ok());
    }

    #[test]
    fn test_twap_staleness_bound() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(3.0));
        let c = AssetId("CCC".into());
        for _ in 0..=MAX_STALENESS {
            oracle
                .update_price(&pool(), &a(), &c, dec!(1.0), false, 1, 1)
                .unwrap();
        }
        let result = oracle.get_twap(&a(), &b());
        assert!(matches!(
            result,
            Err(AmmError::StalePrice { staleness, bound })
                if staleness == MAX_STALENESS + 1 && bound == MAX_STALENESS
        ));
    }

    #[test]
    fn test_twap_missing_pair() {
        let oracle = PriceOracle::new(pool());
        assert!(matches!(
            oracle.get_twap(&a(), &b()),
            Err(AmmError::NoPriceData(_))
        ));
    }

    #[test]
    fn test_reversed_caller_order_inverts_price() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(4.0));
        let forward = oracle.get_twap(&a(), &b()).unwrap();
        let backward = oracle.get_twap(&b(), &a()).unwrap();
        assert_eq!(forward, dec!(4.0));
        assert_eq!(backward, dec!(0.25));
    }

    #[test]
    fn test_reversed_update_order_is_canonicalized() {
        let mut oracle = PriceOracle::new(pool());
        // Trade quoted as AAA per BBB; canonical record stores BBB per AAA.
        oracle
            .update_price(&pool(), &b(), &a(), dec!(0.5), true, 100, 200)
            .unwrap();
        assert_eq!(oracle.get_twap(&a(), &b()).unwrap(), dec!(2.0));
    }

    #[test]
    fn test_history_sampled_every_interval() {
        let mut oracle = PriceOracle::new(pool());
        for _ in 0..HISTORY_INTERVAL * 2 {
            push(&mut oracle, dec!(2.0));
        }
        let history = oracle.get_price_history(&a(), &b(), 1_000).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].update_count, HISTORY_INTERVAL);
        assert_eq!(history[1].update_count, HISTORY_INTERVAL * 2);
    }

    #[test]
    fn test_history_range_filter() {
        let mut oracle = PriceOracle::new(pool());
        for _ in 0..HISTORY_INTERVAL * 2 {
            push(&mut oracle, dec!(2.0));
        }
        // Only samples within the last HISTORY_INTERVAL updates qualify.
        let recent = oracle
            .get_price_history(&a(), &b(), HISTORY_INTERVAL)
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].update_count, HISTORY_INTERVAL * 2);
    }

    #[test]
    fn test_transaction_record_counts_and_orientation() {
        let mut oracle = PriceOracle::new(pool());
        oracle
            .update_price(&pool(), &a(), &b(), dec!(2.0), false, 100, 200)
            .unwrap();
        oracle
            .update_price(&pool(), &b(), &a(), dec!(0.5), true, 200, 100)
            .unwrap();

        let forward = oracle.get_transaction_data(&a(), &b()).unwrap();
        assert_eq!(forward.buy_count, 1);
        assert_eq!(forward.sell_count, 1);
        assert_eq!(forward.entries.len(), 2);

        let backward = oracle.get_transaction_data(&b(), &a()).unwrap();
        assert_eq!(backward.buy_count, 1);
        assert_eq!(backward.sell_count, 1);
        assert_eq!(backward.entries[0].is_buy, !forward.entries[0].is_buy);
    }

    #[test]
    fn test_events_emitted_per_update() {
        let mut oracle = PriceOracle::new(pool());
        push(&mut oracle, dec!(2.0));
        let events = oracle.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], OracleEvent::PriceUpdated { .. }));
        assert!(matches!(events[1], OracleEvent::TransactionRecorded { .. }));
        assert!(oracle.take_events().is_empty());
    }
}
