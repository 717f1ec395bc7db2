use chrono::Utc;
use constant_product_amm::domain::oracle::{HISTORY_INTERVAL, MAX_STALENESS};
use constant_product_amm::{
    AccountId, AmmError, AssetId, PairKey, ThreadSafeOracle, ThreadSafePair, TokenLedger,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn dai() -> AssetId {
    AssetId("DAI".into())
}

fn weth() -> AssetId {
    AssetId("WETH".into())
}

fn creator() -> AccountId {
    AccountId("creator".into())
}

fn trader() -> AccountId {
    AccountId("trader".into())
}

/// A pool with an oracle bound and seeded reserves on both sides
fn oracle_pool(reserve: u128) -> (ThreadSafePair, ThreadSafeOracle, TokenLedger) {
    let now = Utc::now();
    let key = PairKey::new(dai(), weth()).unwrap();
    let pool = ThreadSafePair::new(key, creator(), now);
    let oracle = ThreadSafeOracle::new(pool.account());
    pool.set_price_oracle(&creator(), oracle.clone(), now).unwrap();

    let mut ledger = TokenLedger::new();
    ledger.credit(&dai(), &pool.account(), reserve);
    ledger.credit(&weth(), &pool.account(), reserve);
    pool.mint(&mut ledger, &creator(), now).unwrap();
    (pool, oracle, ledger)
}

fn swap_dai_in(pool: &ThreadSafePair, ledger: &mut TokenLedger, amount_in: u128) -> u128 {
    let now = Utc::now();
    ledger.credit(&dai(), &trader(), amount_in);
    ledger
        .transfer(&dai(), &trader(), &pool.account(), amount_in)
        .unwrap();
    let out = pool.get_amount_out(amount_in, &dai()).unwrap();
    pool.swap(ledger, 0, out, &trader(), &[], None, now).unwrap();
    out
}

#[test]
fn test_swap_feeds_oracle() {
    let (pool, oracle, mut ledger) = oracle_pool(1_000_000);

    let out = swap_dai_in(&pool, &mut ledger, 10_000);
    assert_eq!(oracle.update_count(), 1);

    // First observation: the blend equals the execution price.
    let twap = oracle.get_twap(&dai(), &weth()).unwrap();
    let expected = Decimal::from(out as u64) / Decimal::from(10_000u64);
    assert!((twap - expected).abs() < dec!(0.001));
}

#[test]
fn test_oracle_rejects_non_pool_caller() {
    let (_pool, oracle, _ledger) = oracle_pool(1_000_000);
    let result = oracle.update_price(&trader(), &dai(), &weth(), dec!(1.0), false, 1, 1);
    assert!(matches!(result, Err(AmmError::Forbidden(_))));
}

#[test]
fn test_twap_blends_across_swaps() {
    let (pool, oracle, mut ledger) = oracle_pool(10_000_000);

    swap_dai_in(&pool, &mut ledger, 10_000);
    let first = oracle.get_twap(&dai(), &weth()).unwrap();

    // Trading in the same direction pushes the price down; the blend moves
    // that way but lags the raw trade price.
    for _ in 0..5 {
        swap_dai_in(&pool, &mut ledger, 500_000);
    }
    let blended = oracle.get_twap(&dai(), &weth()).unwrap();
    let last_trade = oracle
        .get_transaction_data(&dai(), &weth())
        .unwrap()
        .entries
        .last()
        .map(|e| Decimal::from(e.amount_received as u64) / Decimal::from(e.amount_in as u64))
        .unwrap();
    assert!(blended < first);
    assert!(blended > last_trade);
}

#[test]
fn test_inverse_orientation_query() {
    let (pool, oracle, mut ledger) = oracle_pool(1_000_000);
    swap_dai_in(&pool, &mut ledger, 10_000);

    let forward = oracle.get_twap(&dai(), &weth()).unwrap();
    let backward = oracle.get_twap(&weth(), &dai()).unwrap();
    assert!((forward * backward - Decimal::ONE).abs() < dec!(0.0001));
}

#[test]
fn test_transaction_record_tracks_direction() {
    let (pool, oracle, mut ledger) = oracle_pool(1_000_000);
    let now = Utc::now();

    // DAI in, WETH out: a sell of the canonical base (DAI).
    swap_dai_in(&pool, &mut ledger, 10_000);

    // WETH in, DAI out: a buy of the base.
    ledger.credit(&weth(), &trader(), 10_000);
    ledger
        .transfer(&weth(), &trader(), &pool.account(), 10_000)
        .unwrap();
    let out = pool.get_amount_out(10_000, &weth()).unwrap();
    pool.swap(&mut ledger, out, 0, &trader(), &[], None, now)
        .unwrap();

    let record = oracle.get_transaction_data(&dai(), &weth()).unwrap();
    assert_eq!(record.sell_count, 1);
    assert_eq!(record.buy_count, 1);
    assert_eq!(record.entries.len(), 2);
    assert!(!record.entries[0].is_buy);
    assert!(record.entries[1].is_buy);
}

#[test]
fn test_price_history_accumulates_sparsely() {
    let (pool, oracle, mut ledger) = oracle_pool(100_000_000);

    for _ in 0..HISTORY_INTERVAL * 2 {
        swap_dai_in(&pool, &mut ledger, 1_000);
    }
    let history = oracle
        .get_price_history(&dai(), &weth(), 10 * HISTORY_INTERVAL)
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].update_count < history[1].update_count);
}

#[test]
fn test_staleness_bound_enforced_across_pairs() {
    let (pool, oracle, mut ledger) = oracle_pool(1_000_000);
    swap_dai_in(&pool, &mut ledger, 10_000);

    // Updates for an unrelated pair age the first pair's record.
    for _ in 0..=MAX_STALENESS {
        oracle
            .update_price(
                &pool.account(),
                &AssetId("USDC".into()),
                &AssetId("WBTC".into()),
                dec!(1.0),
                false,
                1,
                1,
            )
            .unwrap();
    }
    let result = oracle.get_twap(&dai(), &weth());
    assert!(matches!(result, Err(AmmError::StalePrice { .. })));

    // The freshly updated pair still answers.
    assert!(oracle
        .get_twap(&AssetId("USDC".into()), &AssetId("WBTC".into()))
        .is_ok());
}

#[test]
fn test_unbound_pool_swaps_without_oracle() {
    let now = Utc::now();
    let key = PairKey::new(dai(), weth()).unwrap();
    let pool = ThreadSafePair::new(key, creator(), now);
    let mut ledger = TokenLedger::new();
    ledger.credit(&dai(), &pool.account(), 1_000_000);
    ledger.credit(&weth(), &pool.account(), 1_000_000);
    pool.mint(&mut ledger, &creator(), now).unwrap();

    let out = swap_dai_in(&pool, &mut ledger, 10_000);
    assert!(out > 0);
}

#[test]
fn test_oracle_binding_is_creator_only() {
    let now = Utc::now();
    let key = PairKey::new(dai(), weth()).unwrap();
    let pool = ThreadSafePair::new(key, creator(), now);
    let oracle = ThreadSafeOracle::new(pool.account());
    let result = pool.set_price_oracle(&trader(), oracle, now);
    assert!(matches!(result, Err(AmmError::Forbidden(_))));
}
