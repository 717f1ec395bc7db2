//! Constant-product pair: reserve ledger, swap engine and fee accounting.
//!
//! A [`Pair`] owns the full state of one pool (reserves, liquidity shares,
//! dividend accumulators and reward queues) and runs every mutating
//! operation to completion under a reentrancy flag. Token custody lives in
//! the external [`TokenLedger`]; the pair holds funds under its own account
//! and measures deposits as the excess of its ledger balance over the
//! committed reserves plus undistributed fee holdings.

use crate::domain::events::PoolEvent;
use crate::domain::ledger::TokenLedger;
use crate::domain::math::{integer_sqrt, mul_div, reserve_product, to_u128, U256};
use crate::domain::oracle::ThreadSafeOracle;
use crate::domain::registry::SharedFactoryConfig;
use crate::domain::rewards::{DividendAccumulator, LiquidityPosition, RewardQueue};
use crate::domain::types::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Context handed to the optional mid-swap callback
#[derive(Debug, Clone)]
pub struct SwapCallbackContext {
    /// Output recipient of the swap
    pub recipient: AccountId,
    /// Output already transferred on the canonically first side
    pub out_base: u128,
    /// Output already transferred on the canonically second side
    pub out_quote: u128,
    /// Caller-supplied opaque data
    pub data: Vec<u8>,
}

/// Synchronous flash-swap hook invoked between the optimistic output
/// transfer and the final balance re-check.
///
/// The callback may move ledger funds (including returning the borrowed
/// output), but any nested mutating pool entry is rejected by the
/// reentrancy guard.
pub trait SwapCallback {
    /// Called once per swap that carries non-empty data
    fn on_swap(
        &self,
        pair: &mut Pair,
        ledger: &mut TokenLedger,
        ctx: &SwapCallbackContext,
    ) -> AmmResult<()>;
}

/// One constant-product pool for a canonical asset pair
#[derive(Debug, Clone)]
pub struct Pair {
    key: PairKey,
    account: AccountId,
    creator: AccountId,
    reserve_base: u128,
    reserve_quote: u128,
    total_shares: u128,
    invariant_checkpoint: U256,
    last_update: Timestamp,
    cumulative_price_base: Decimal,
    cumulative_price_quote: Decimal,
    adjustable_fee_bps: u128,
    positions: HashMap<AccountId, LiquidityPosition>,
    dividends: DividendAccumulator,
    rewards_base: RewardQueue,
    rewards_quote: RewardQueue,
    fee_holdings_base: u128,
    fee_holdings_quote: u128,
    factory: Option<SharedFactoryConfig>,
    oracle: Option<ThreadSafeOracle>,
    events: Vec<PoolEvent>,
    entered: bool,
}

impl Pair {
    /// Creates a pool for the canonical pair, owned by `creator`
    pub fn new(key: PairKey, creator: AccountId, now: Timestamp) -> Self {
        let account = AccountId(format!("pool:{key}"));
        let mut pair = Self {
            key: key.clone(),
            account,
            creator: creator.clone(),
            reserve_base: 0,
            reserve_quote: 0,
            total_shares: 0,
            invariant_checkpoint: U256::zero(),
            last_update: now,
            cumulative_price_base: Decimal::ZERO,
            cumulative_price_quote: Decimal::ZERO,
            adjustable_fee_bps: DEFAULT_ADJUSTABLE_FEE_BPS,
            positions: HashMap::new(),
            dividends: DividendAccumulator::new(),
            rewards_base: RewardQueue::new(),
            rewards_quote: RewardQueue::new(),
            fee_holdings_base: 0,
            fee_holdings_quote: 0,
            factory: None,
            oracle: None,
            events: Vec::new(),
            entered: false,
        };
        pair.events.push(PoolEvent::PoolCreated {
            pair: key,
            creator,
            timestamp: now,
        });
        pair
    }

    /// Canonical pair identity
    pub fn key(&self) -> &PairKey {
        &self.key
    }

    /// Ledger account the pool holds funds under
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Pool creator
    pub fn creator(&self) -> &AccountId {
        &self.creator
    }

    /// Committed reserves and the time of the last commit
    pub fn get_reserves(&self) -> (u128, u128, Timestamp) {
        (self.reserve_base, self.reserve_quote, self.last_update)
    }

    /// Outstanding liquidity shares
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Liquidity shares held by an account
    pub fn share_balance(&self, account: &AccountId) -> u128 {
        self.positions
            .get(account)
            .map(|p| p.share_balance)
            .unwrap_or(0)
    }

    /// Settled but unwithdrawn dividends of an account
    pub fn pending_dividends(&self, account: &AccountId) -> (u128, u128) {
        self.positions
            .get(account)
            .map(|p| (p.pending_base, p.pending_quote))
            .unwrap_or((0, 0))
    }

    /// Dividend unlock time of an account, if any dividends were settled
    pub fn dividend_unlock_time(&self, account: &AccountId) -> Option<Timestamp> {
        self.positions
            .get(account)
            .and_then(|p| p.dividend_unlock_time)
    }

    /// Reward epochs accrued on one side, drained ones included
    pub fn reward_epochs(&self, side: PairSide) -> &[crate::domain::rewards::RewardEpoch] {
        match side {
            PairSide::Base => self.rewards_base.epochs(),
            PairSide::Quote => self.rewards_quote.epochs(),
        }
    }

    /// Undistributed fee token holdings (dividends plus locked rewards)
    pub fn fee_holdings(&self) -> (u128, u128) {
        (self.fee_holdings_base, self.fee_holdings_quote)
    }

    /// Current adjustable fee in basis points
    pub fn adjustable_fee_bps(&self) -> u128 {
        self.adjustable_fee_bps
    }

    /// Wall-clock cumulative price accumulators (base-in-quote, quote-in-base)
    pub fn cumulative_prices(&self) -> (Decimal, Decimal) {
        (self.cumulative_price_base, self.cumulative_price_quote)
    }

    /// Observable events accumulated so far
    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// Drains the accumulated events
    pub fn take_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Attaches the factory collaborator used for protocol-fee minting
    pub fn set_factory_config(&mut self, factory: SharedFactoryConfig) {
        self.factory = Some(factory);
    }

    /// Binds the price oracle. Creator-only.
    pub fn set_price_oracle(
        &mut self,
        caller: &AccountId,
        oracle: ThreadSafeOracle,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.require_creator(caller)?;
        self.oracle = Some(oracle);
        self.events.push(PoolEvent::OracleBound {
            pair: self.key.clone(),
            timestamp: now,
        });
        Ok(())
    }

    /// Sets the creator-adjustable fee component, clamped into
    /// `[MIN_ADJUSTABLE_FEE_BPS, MAX_ADJUSTABLE_FEE_BPS]`. Creator-only.
    pub fn set_adjustable_fee(
        &mut self,
        caller: &AccountId,
        bps: u128,
        now: Timestamp,
    ) -> AmmResult<u128> {
        self.require_creator(caller)?;
        let effective = bps.clamp(MIN_ADJUSTABLE_FEE_BPS, MAX_ADJUSTABLE_FEE_BPS);
        self.adjustable_fee_bps = effective;
        self.events.push(PoolEvent::FeeChanged {
            pair: self.key.clone(),
            adjustable_fee_bps: effective,
            timestamp: now,
        });
        Ok(effective)
    }

    /// Combined fee rate (adjustable + fixed) in basis points
    pub fn total_fee_bps(&self) -> AmmResult<u128> {
        let total = self.adjustable_fee_bps + FIXED_FEE_BPS;
        let min = MIN_ADJUSTABLE_FEE_BPS + FIXED_FEE_BPS;
        let max = MAX_ADJUSTABLE_FEE_BPS + FIXED_FEE_BPS;
        if total < min || total > max {
            return Err(AmmError::FeeOutOfRange(total));
        }
        Ok(total)
    }

    /// Mints liquidity shares against the deposit already transferred to the
    /// pool account, returning the shares credited to `to`.
    pub fn mint(
        &mut self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<u128> {
        self.enter()?;
        let checkpoint = self.clone();
        let result = self.mint_locked(ledger, to, now);
        if result.is_err() {
            *self = checkpoint;
        }
        self.entered = false;
        result
    }

    /// Burns the shares held by the pool account (transferred in beforehand)
    /// and pays the pro-rata reserves out to `to`.
    pub fn burn(
        &mut self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.enter()?;
        let checkpoint = self.clone();
        let result = self.burn_locked(ledger, to, now);
        if result.is_err() {
            *self = checkpoint;
        }
        self.entered = false;
        result
    }

    /// Swaps against the reserves: sends the requested outputs, optionally
    /// invokes the flash-swap callback, then measures inputs and verifies
    /// the fee-adjusted constant product. On any failure the ledger is
    /// restored to its pre-swap state.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &mut self,
        ledger: &mut TokenLedger,
        out_base: u128,
        out_quote: u128,
        to: &AccountId,
        data: &[u8],
        callback: Option<&dyn SwapCallback>,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.enter()?;
        let snapshot = ledger.snapshot();
        let checkpoint = self.clone();
        let result = self.swap_locked(ledger, out_base, out_quote, to, data, callback, now);
        if result.is_err() {
            ledger.restore(snapshot);
            *self = checkpoint;
        }
        self.entered = false;
        result
    }

    /// Sweeps any balance in excess of reserves plus fee holdings to `to`
    pub fn skim(&mut self, ledger: &mut TokenLedger, to: &AccountId) -> AmmResult<(u128, u128)> {
        self.enter()?;
        let result = self.skim_locked(ledger, to);
        self.entered = false;
        result
    }

    /// Recommits reserves to match actual balances, without swap logic
    pub fn sync(&mut self, ledger: &mut TokenLedger, now: Timestamp) -> AmmResult<()> {
        self.enter()?;
        let result = self.sync_locked(ledger, now);
        self.entered = false;
        result
    }

    /// Moves liquidity shares between holders, settling both positions
    /// first so no accrued dividends leak across the transfer.
    pub fn transfer_shares(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.enter()?;
        let result = self.transfer_shares_locked(from, to, amount, now);
        self.entered = false;
        result
    }

    /// Settles an account's dividends against the current accumulators
    pub fn settle_dividends(&mut self, account: &AccountId, now: Timestamp) -> AmmResult<()> {
        self.enter()?;
        let result = self.settle_position(account, now);
        self.entered = false;
        result
    }

    /// Settles, then pays out the caller's pending dividends once the
    /// two-week lock has passed. State is cleared before funds move.
    pub fn withdraw_dividends(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.enter()?;
        let checkpoint = self.clone();
        let result = self.withdraw_dividends_locked(ledger, caller, now);
        if result.is_err() {
            *self = checkpoint;
        }
        self.entered = false;
        result
    }

    /// Collects unlocked reward epochs in strict creation order. Creator-only.
    pub fn withdraw_reward_epochs(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.enter()?;
        let checkpoint = self.clone();
        let result = self.withdraw_reward_epochs_locked(ledger, caller, now);
        if result.is_err() {
            *self = checkpoint;
        }
        self.entered = false;
        result
    }

    /// Quotes the output for an exact input, net of the total fee
    pub fn get_amount_out(&self, amount_in: u128, asset_in: &AssetId) -> AmmResult<u128> {
        if amount_in == 0 {
            return Err(AmmError::InsufficientInput);
        }
        let (reserve_in, reserve_out) = self.oriented_reserves(asset_in)?;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::InsufficientLiquidity("empty reserves".into()));
        }
        let fee_bps = self.total_fee_bps()?;
        let in_with_fee = U256::from(amount_in) * U256::from(FEE_DENOMINATOR - fee_bps);
        let numerator = in_with_fee * U256::from(reserve_out);
        let denominator = U256::from(reserve_in) * U256::from(FEE_DENOMINATOR) + in_with_fee;
        let out = to_u128(numerator / denominator)?;
        if out == 0 {
            return Err(AmmError::InsufficientOutput);
        }
        Ok(out)
    }

    /// Quotes the input required for an exact output, net of the total fee
    pub fn get_amount_in(&self, amount_out: u128, asset_out: &AssetId) -> AmmResult<u128> {
        if amount_out == 0 {
            return Err(AmmError::InsufficientOutput);
        }
        let (reserve_out, reserve_in) = self.oriented_reserves(asset_out)?;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::InsufficientLiquidity("empty reserves".into()));
        }
        if amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity(
                "requested output exceeds reserve".into(),
            ));
        }
        let fee_bps = self.total_fee_bps()?;
        let numerator =
            U256::from(reserve_in) * U256::from(amount_out) * U256::from(FEE_DENOMINATOR);
        let denominator =
            U256::from(reserve_out - amount_out) * U256::from(FEE_DENOMINATOR - fee_bps);
        to_u128(numerator / denominator + U256::one())
    }

    // ---- locked bodies -------------------------------------------------

    fn mint_locked(
        &mut self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<u128> {
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        let amount_base = balance_base.saturating_sub(self.reserve_base);
        let amount_quote = balance_quote.saturating_sub(self.reserve_quote);

        self.mint_protocol_fee(now)?;

        let shares = if self.total_shares == 0 {
            let root = to_u128(integer_sqrt(
                U256::from(amount_base) * U256::from(amount_quote),
            ))?;
            if root <= MINIMUM_LIQUIDITY {
                return Err(AmmError::InsufficientLiquidity(
                    "initial deposit below minimum liquidity".into(),
                ));
            }
            // The first MINIMUM_LIQUIDITY shares are locked forever.
            self.credit_shares(&AccountId(BURN_ACCOUNT.into()), MINIMUM_LIQUIDITY, now)?;
            root - MINIMUM_LIQUIDITY
        } else {
            let by_base = mul_div(amount_base, self.total_shares, self.reserve_base)?;
            let by_quote = mul_div(amount_quote, self.total_shares, self.reserve_quote)?;
            by_base.min(by_quote)
        };
        if shares == 0 {
            return Err(AmmError::InsufficientLiquidity("zero shares minted".into()));
        }

        self.credit_shares(to, shares, now)?;
        self.commit_reserves(balance_base, balance_quote, now)?;
        self.invariant_checkpoint = reserve_product(self.reserve_base, self.reserve_quote);

        tracing::debug!(
            pair = %self.key,
            recipient = %to,
            amount_base,
            amount_quote,
            shares,
            "liquidity minted"
        );
        self.events.push(PoolEvent::LiquidityMinted {
            pair: self.key.clone(),
            recipient: to.clone(),
            amount_base,
            amount_quote,
            shares,
            timestamp: now,
        });
        Ok(shares)
    }

    fn burn_locked(
        &mut self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        let pool_account = self.account.clone();
        let shares = self.share_balance(&pool_account);
        if shares == 0 {
            return Err(AmmError::InsufficientLiquidity(
                "no shares transferred in to burn".into(),
            ));
        }

        self.mint_protocol_fee(now)?;

        let amount_base = mul_div(shares, balance_base, self.total_shares)?;
        let amount_quote = mul_div(shares, balance_quote, self.total_shares)?;
        if amount_base == 0 || amount_quote == 0 {
            return Err(AmmError::InsufficientLiquidity(
                "zero amount burned".into(),
            ));
        }

        self.debit_shares(&pool_account, shares, now)?;
        ledger.transfer(&self.key.base.clone(), &pool_account, to, amount_base)?;
        ledger.transfer(&self.key.quote.clone(), &pool_account, to, amount_quote)?;

        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        self.commit_reserves(balance_base, balance_quote, now)?;
        self.invariant_checkpoint = reserve_product(self.reserve_base, self.reserve_quote);

        tracing::debug!(
            pair = %self.key,
            recipient = %to,
            amount_base,
            amount_quote,
            shares,
            "liquidity burned"
        );
        self.events.push(PoolEvent::LiquidityBurned {
            pair: self.key.clone(),
            recipient: to.clone(),
            amount_base,
            amount_quote,
            shares,
            timestamp: now,
        });
        Ok((amount_base, amount_quote))
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_locked(
        &mut self,
        ledger: &mut TokenLedger,
        out_base: u128,
        out_quote: u128,
        to: &AccountId,
        data: &[u8],
        callback: Option<&dyn SwapCallback>,
        now: Timestamp,
    ) -> AmmResult<()> {
        if out_base == 0 && out_quote == 0 {
            return Err(AmmError::InsufficientOutput);
        }
        if out_base >= self.reserve_base || out_quote >= self.reserve_quote {
            return Err(AmmError::InsufficientLiquidity(
                "requested output exceeds reserve".into(),
            ));
        }

        // Optimistic output transfer; retracted by the caller-side snapshot
        // if anything below fails.
        let pool_account = self.account.clone();
        if out_base > 0 {
            ledger.transfer(&self.key.base.clone(), &pool_account, to, out_base)?;
        }
        if out_quote > 0 {
            ledger.transfer(&self.key.quote.clone(), &pool_account, to, out_quote)?;
        }

        if !data.is_empty() {
            if let Some(callback) = callback {
                let ctx = SwapCallbackContext {
                    recipient: to.clone(),
                    out_base,
                    out_quote,
                    data: data.to_vec(),
                };
                callback.on_swap(self, ledger, &ctx)?;
            }
        }

        // Final balance re-check: measure what actually came in.
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        let in_base = balance_base.saturating_sub(self.reserve_base - out_base);
        let in_quote = balance_quote.saturating_sub(self.reserve_quote - out_quote);
        if in_base == 0 && in_quote == 0 {
            return Err(AmmError::InsufficientInput);
        }

        let fee_bps = self.total_fee_bps()?;
        let adjusted_base = U256::from(balance_base) * U256::from(FEE_DENOMINATOR)
            - U256::from(in_base) * U256::from(fee_bps);
        let adjusted_quote = U256::from(balance_quote) * U256::from(FEE_DENOMINATOR)
            - U256::from(in_quote) * U256::from(fee_bps);
        let threshold = reserve_product(self.reserve_base, self.reserve_quote)
            * U256::from(FEE_DENOMINATOR)
            * U256::from(FEE_DENOMINATOR);
        if adjusted_base * adjusted_quote < threshold {
            return Err(AmmError::InvariantViolation);
        }

        self.route_fees(PairSide::Base, in_base, now)?;
        self.route_fees(PairSide::Quote, in_quote, now)?;

        // Fee holdings grew, so the committed reserves shrink accordingly.
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        self.commit_reserves(balance_base, balance_quote, now)?;

        self.notify_oracle(in_base, in_quote, out_base, out_quote)?;

        tracing::debug!(
            pair = %self.key,
            recipient = %to,
            in_base,
            in_quote,
            out_base,
            out_quote,
            reserve_base = self.reserve_base,
            reserve_quote = self.reserve_quote,
            "swap executed"
        );
        self.events.push(PoolEvent::SwapExecuted {
            pair: self.key.clone(),
            recipient: to.clone(),
            in_base,
            in_quote,
            out_base,
            out_quote,
            reserve_base: self.reserve_base,
            reserve_quote: self.reserve_quote,
            timestamp: now,
        });
        Ok(())
    }

    fn skim_locked(
        &mut self,
        ledger: &mut TokenLedger,
        to: &AccountId,
    ) -> AmmResult<(u128, u128)> {
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        let excess_base = balance_base.saturating_sub(self.reserve_base);
        let excess_quote = balance_quote.saturating_sub(self.reserve_quote);
        let pool_account = self.account.clone();
        if excess_base > 0 {
            ledger.transfer(&self.key.base.clone(), &pool_account, to, excess_base)?;
        }
        if excess_quote > 0 {
            ledger.transfer(&self.key.quote.clone(), &pool_account, to, excess_quote)?;
        }
        tracing::debug!(pair = %self.key, excess_base, excess_quote, "skimmed excess balance");
        Ok((excess_base, excess_quote))
    }

    fn sync_locked(&mut self, ledger: &mut TokenLedger, now: Timestamp) -> AmmResult<()> {
        let (balance_base, balance_quote) = self.net_balances(ledger)?;
        self.commit_reserves(balance_base, balance_quote, now)?;
        self.events.push(PoolEvent::ReservesSynced {
            pair: self.key.clone(),
            reserve_base: self.reserve_base,
            reserve_quote: self.reserve_quote,
            timestamp: now,
        });
        Ok(())
    }

    fn transfer_shares_locked(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.settle_position(from, now)?;
        self.settle_position(to, now)?;
        let held = self.share_balance(from);
        if held < amount {
            return Err(AmmError::InsufficientBalance {
                account: from.0.clone(),
                held,
                needed: amount,
            });
        }
        if let Some(position) = self.positions.get_mut(from) {
            position.share_balance -= amount;
        }
        if let Some(position) = self.positions.get_mut(to) {
            position.share_balance += amount;
        }
        Ok(())
    }

    fn withdraw_dividends_locked(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.settle_position(caller, now)?;
        let position = self
            .positions
            .get_mut(caller)
            .ok_or(AmmError::NothingToWithdraw)?;
        if position.pending_base == 0 && position.pending_quote == 0 {
            return Err(AmmError::NothingToWithdraw);
        }
        let unlock = position
            .dividend_unlock_time
            .ok_or(AmmError::NothingToWithdraw)?;
        if now < unlock {
            return Err(AmmError::Locked(unlock));
        }

        // State cleared before the funds move.
        let amount_base = position.pending_base;
        let amount_quote = position.pending_quote;
        position.pending_base = 0;
        position.pending_quote = 0;

        let pool_account = self.account.clone();
        if amount_base > 0 {
            ledger.transfer(&self.key.base.clone(), &pool_account, caller, amount_base)?;
            self.fee_holdings_base = self.fee_holdings_base.saturating_sub(amount_base);
        }
        if amount_quote > 0 {
            ledger.transfer(&self.key.quote.clone(), &pool_account, caller, amount_quote)?;
            self.fee_holdings_quote = self.fee_holdings_quote.saturating_sub(amount_quote);
        }

        tracing::debug!(
            pair = %self.key,
            account = %caller,
            amount_base,
            amount_quote,
            "dividends withdrawn"
        );
        self.events.push(PoolEvent::DividendsWithdrawn {
            pair: self.key.clone(),
            account: caller.clone(),
            amount_base,
            amount_quote,
            timestamp: now,
        });
        Ok((amount_base, amount_quote))
    }

    fn withdraw_reward_epochs_locked(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.require_creator(caller)?;
        let amount_base = self.rewards_base.collect(now);
        let amount_quote = self.rewards_quote.collect(now);
        if amount_base == 0 && amount_quote == 0 {
            return Err(AmmError::NothingToWithdraw);
        }

        let pool_account = self.account.clone();
        if amount_base > 0 {
            ledger.transfer(&self.key.base.clone(), &pool_account, caller, amount_base)?;
            self.fee_holdings_base = self.fee_holdings_base.saturating_sub(amount_base);
        }
        if amount_quote > 0 {
            ledger.transfer(&self.key.quote.clone(), &pool_account, caller, amount_quote)?;
            self.fee_holdings_quote = self.fee_holdings_quote.saturating_sub(amount_quote);
        }

        tracing::debug!(
            pair = %self.key,
            creator = %caller,
            amount_base,
            amount_quote,
            "reward epochs withdrawn"
        );
        self.events.push(PoolEvent::RewardEpochWithdrawn {
            pair: self.key.clone(),
            creator: caller.clone(),
            amount_base,
            amount_quote,
            timestamp: now,
        });
        Ok((amount_base, amount_quote))
    }

    // ---- internals -----------------------------------------------------

    fn enter(&mut self) -> AmmResult<()> {
        if self.entered {
            return Err(AmmError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    fn require_creator(&self, caller: &AccountId) -> AmmResult<()> {
        if caller != &self.creator {
            return Err(AmmError::Forbidden(format!(
                "operation restricted to pool creator {}",
                self.creator
            )));
        }
        Ok(())
    }

    /// Pool balances net of undistributed fee holdings
    fn net_balances(&self, ledger: &TokenLedger) -> AmmResult<(u128, u128)> {
        let raw_base = ledger.balance_of(&self.key.base, &self.account);
        let raw_quote = ledger.balance_of(&self.key.quote, &self.account);
        let base = raw_base
            .checked_sub(self.fee_holdings_base)
            .ok_or(AmmError::MathOverflow)?;
        let quote = raw_quote
            .checked_sub(self.fee_holdings_quote)
            .ok_or(AmmError::MathOverflow)?;
        Ok((base, quote))
    }

    fn oriented_reserves(&self, asset: &AssetId) -> AmmResult<(u128, u128)> {
        if self.key.is_base(asset) {
            Ok((self.reserve_base, self.reserve_quote))
        } else if self.key.contains(asset) {
            Ok((self.reserve_quote, self.reserve_base))
        } else {
            Err(AmmError::InvalidAsset)
        }
    }

    fn settle_position(&mut self, account: &AccountId, now: Timestamp) -> AmmResult<()> {
        let dividends = &self.dividends;
        let position = self.positions.entry(account.clone()).or_default();
        dividends.settle(position, now)
    }

    fn credit_shares(&mut self, account: &AccountId, amount: u128, now: Timestamp) -> AmmResult<()> {
        self.settle_position(account, now)?;
        let position = self.positions.entry(account.clone()).or_default();
        position.share_balance = position
            .share_balance
            .checked_add(amount)
            .ok_or(AmmError::MathOverflow)?;
        self.total_shares = self
            .total_shares
            .checked_add(amount)
            .ok_or(AmmError::MathOverflow)?;
        Ok(())
    }

    fn debit_shares(&mut self, account: &AccountId, amount: u128, now: Timestamp) -> AmmResult<()> {
        self.settle_position(account, now)?;
        let held = self.share_balance(account);
        if held < amount {
            return Err(AmmError::InsufficientBalance {
                account: account.0.clone(),
                held,
                needed: amount,
            });
        }
        if let Some(position) = self.positions.get_mut(account) {
            position.share_balance -= amount;
        }
        self.total_shares -= amount;
        Ok(())
    }

    /// Mints protocol-fee shares proportional to invariant growth since the
    /// last checkpoint, when the factory has a fee recipient configured
    fn mint_protocol_fee(&mut self, now: Timestamp) -> AmmResult<()> {
        let recipient = match &self.factory {
            Some(factory) => factory
                .read()
                .expect("Failed to acquire read lock")
                .fee_recipient
                .clone(),
            None => None,
        };
        let Some(recipient) = recipient else {
            return Ok(());
        };
        if self.invariant_checkpoint.is_zero() || self.total_shares == 0 {
            return Ok(());
        }
        let root_new = integer_sqrt(reserve_product(self.reserve_base, self.reserve_quote));
        let root_old = integer_sqrt(self.invariant_checkpoint);
        if root_new <= root_old {
            return Ok(());
        }
        let numerator = U256::from(self.total_shares) * (root_new - root_old);
        let denominator = root_new * U256::from(5u64) + root_old;
        let shares = to_u128(numerator / denominator)?;
        if shares > 0 {
            self.credit_shares(&recipient, shares, now)?;
            tracing::debug!(pair = %self.key, recipient = %recipient, shares, "protocol fee minted");
        }
        Ok(())
    }

    /// Splits one side's swap input into the reward (adjustable) and
    /// dividend (fixed) fee components
    fn route_fees(&mut self, side: PairSide, amount_in: u128, now: Timestamp) -> AmmResult<()> {
        if amount_in == 0 {
            return Ok(());
        }
        let reward_fee = mul_div(amount_in, self.adjustable_fee_bps, FEE_DENOMINATOR)?;
        let dividend_fee = mul_div(amount_in, FIXED_FEE_BPS, FEE_DENOMINATOR)?;
        // Without outstanding shares there is nobody to pay the dividend
        // to; that portion stays in the reserves.
        let held_dividend = if self.total_shares > 0 { dividend_fee } else { 0 };

        match side {
            PairSide::Base => {
                self.rewards_base.accrue(reward_fee, now);
                self.dividends.accrue(PairSide::Base, dividend_fee, self.total_shares);
                self.fee_holdings_base = self
                    .fee_holdings_base
                    .checked_add(reward_fee + held_dividend)
                    .ok_or(AmmError::MathOverflow)?;
            }
            PairSide::Quote => {
                self.rewards_quote.accrue(reward_fee, now);
                self.dividends.accrue(PairSide::Quote, dividend_fee, self.total_shares);
                self.fee_holdings_quote = self
                    .fee_holdings_quote
                    .checked_add(reward_fee + held_dividend)
                    .ok_or(AmmError::MathOverflow)?;
            }
        }
        Ok(())
    }

    fn commit_reserves(
        &mut self,
        balance_base: u128,
        balance_quote: u128,
        now: Timestamp,
    ) -> AmmResult<()> {
        if balance_base > MAX_RESERVE {
            return Err(AmmError::ReserveOverflow(balance_base));
        }
        if balance_quote > MAX_RESERVE {
            return Err(AmmError::ReserveOverflow(balance_quote));
        }
        let elapsed = (now - self.last_update).num_seconds();
        if elapsed > 0 && self.reserve_base > 0 && self.reserve_quote > 0 {
            let elapsed = Decimal::from(elapsed);
            self.cumulative_price_base +=
                spot_price(self.reserve_quote, self.reserve_base) * elapsed;
            self.cumulative_price_quote +=
                spot_price(self.reserve_base, self.reserve_quote) * elapsed;
        }
        self.reserve_base = balance_base;
        self.reserve_quote = balance_quote;
        self.last_update = now;
        Ok(())
    }

    fn notify_oracle(
        &mut self,
        in_base: u128,
        in_quote: u128,
        out_base: u128,
        out_quote: u128,
    ) -> AmmResult<()> {
        let Some(oracle) = self.oracle.clone() else {
            return Ok(());
        };
        if in_base > 0 && out_quote > 0 {
            // Base sold for quote: price quoted as quote-out per base-in.
            oracle.update_price(
                &self.account,
                &self.key.base,
                &self.key.quote,
                spot_price(out_quote, in_base),
                false,
                in_base,
                out_quote,
            )?;
        }
        if in_quote > 0 && out_base > 0 {
            oracle.update_price(
                &self.account,
                &self.key.quote,
                &self.key.base,
                spot_price(out_base, in_quote),
                true,
                in_quote,
                out_base,
            )?;
        }
        Ok(())
    }
}

/// Ratio of two integer amounts as a `Decimal`, zero on conversion failure
fn spot_price(numerator: u128, denominator: u128) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    let ratio = numerator as f64 / denominator as f64;
    Decimal::try_from(ratio).unwrap_or(Decimal::ZERO)
}

/// Thread-safe wrapper around [`Pair`].
///
/// All five pool operations plus the fee/dividend entry points take the
/// write lock, so operations on one pool are mutually exclusive; separate
/// pools are independent.
#[derive(Debug, Clone)]
pub struct ThreadSafePair {
    inner: Arc<RwLock<Pair>>,
}

impl ThreadSafePair {
    /// Creates a new thread-safe pool
    pub fn new(key: PairKey, creator: AccountId, now: Timestamp) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Pair::new(key, creator, now))),
        }
    }

    /// Mint with a write lock
    pub fn mint(
        &self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<u128> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .mint(ledger, to, now)
    }

    /// Burn with a write lock
    pub fn burn(
        &self,
        ledger: &mut TokenLedger,
        to: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .burn(ledger, to, now)
    }

    /// Swap with a write lock. The callback receives the inner [`Pair`]
    /// directly; nested mutating entry through it is rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &self,
        ledger: &mut TokenLedger,
        out_base: u128,
        out_quote: u128,
        to: &AccountId,
        data: &[u8],
        callback: Option<&dyn SwapCallback>,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .swap(ledger, out_base, out_quote, to, data, callback, now)
    }

    /// Skim with a write lock
    pub fn skim(&self, ledger: &mut TokenLedger, to: &AccountId) -> AmmResult<(u128, u128)> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .skim(ledger, to)
    }

    /// Sync with a write lock
    pub fn sync(&self, ledger: &mut TokenLedger, now: Timestamp) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .sync(ledger, now)
    }

    /// Share transfer with a write lock
    pub fn transfer_shares(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .transfer_shares(from, to, amount, now)
    }

    /// Dividend settlement with a write lock
    pub fn settle_dividends(&self, account: &AccountId, now: Timestamp) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .settle_dividends(account, now)
    }

    /// Dividend withdrawal with a write lock
    pub fn withdraw_dividends(
        &self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .withdraw_dividends(ledger, caller, now)
    }

    /// Reward epoch withdrawal with a write lock
    pub fn withdraw_reward_epochs(
        &self,
        ledger: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> AmmResult<(u128, u128)> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .withdraw_reward_epochs(ledger, caller, now)
    }

    /// Adjustable fee change with a write lock
    pub fn set_adjustable_fee(
        &self,
        caller: &AccountId,
        bps: u128,
        now: Timestamp,
    ) -> AmmResult<u128> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .set_adjustable_fee(caller, bps, now)
    }

    /// Oracle binding with a write lock
    pub fn set_price_oracle(
        &self,
        caller: &AccountId,
        oracle: ThreadSafeOracle,
        now: Timestamp,
    ) -> AmmResult<()> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .set_price_oracle(caller, oracle, now)
    }

    /// Factory config attachment with a write lock
    pub fn set_factory_config(&self, factory: SharedFactoryConfig) {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .set_factory_config(factory)
    }

    /// Reserves with a read lock
    pub fn get_reserves(&self) -> (u128, u128, Timestamp) {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_reserves()
    }

    /// Exact-input quote with a read lock
    pub fn get_amount_out(&self, amount_in: u128, asset_in: &AssetId) -> AmmResult<u128> {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_amount_out(amount_in, asset_in)
    }

    /// Exact-output quote with a read lock
    pub fn get_amount_in(&self, amount_out: u128, asset_out: &AssetId) -> AmmResult<u128> {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .get_amount_in(amount_out, asset_out)
    }

    /// Pool ledger account with a read lock
    pub fn account(&self) -> AccountId {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .account()
            .clone()
    }

    /// Canonical pair identity with a read lock
    pub fn key(&self) -> PairKey {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .key()
            .clone()
    }

    /// Outstanding shares with a read lock
    pub fn total_shares(&self) -> u128 {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .total_shares()
    }

    /// Holder share balance with a read lock
    pub fn share_balance(&self, account: &AccountId) -> u128 {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .share_balance(account)
    }

    /// Pending dividends with a read lock
    pub fn pending_dividends(&self, account: &AccountId) -> (u128, u128) {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .pending_dividends(account)
    }

    /// Drains accumulated pool events with a write lock
    pub fn take_events(&self) -> Vec<PoolEvent> {
        self.inner
            .write()
            .expect("Failed to acquire write lock")
            .take_events()
    }
}
