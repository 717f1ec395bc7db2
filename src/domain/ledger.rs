//! Minimal fungible-asset collaborator.
//!
//! Pools never hold token state themselves: they query balances and move
//! funds through this ledger, which models the narrow interface the pair
//! consumes (balance query, transfer, transfer-on-behalf). The ledger is
//! cloneable so a swap can snapshot it on entry and restore it wholesale if
//! the operation aborts after transfers were already issued.

use crate::domain::types::{AccountId, AmmError, AmmResult, AssetId};
use std::collections::HashMap;

/// In-memory balances and allowances for any number of fungible assets
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: HashMap<(AssetId, AccountId), u128>,
    allowances: HashMap<(AssetId, AccountId, AccountId), u128>,
}

impl TokenLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account` in `asset`
    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> u128 {
        self.balances
            .get(&(asset.clone(), account.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Credits freshly issued units to an account (test fixtures, faucets)
    pub fn credit(&mut self, asset: &AssetId, account: &AccountId, amount: u128) {
        let entry = self
            .balances
            .entry((asset.clone(), account.clone()))
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Moves `amount` of `asset` from `from` to `to`
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> AmmResult<()> {
        let held = self.balance_of(asset, from);
        if held < amount {
            return Err(AmmError::InsufficientBalance {
                account: from.0.clone(),
                held,
                needed: amount,
            });
        }
        self.balances
            .insert((asset.clone(), from.clone()), held - amount);
        self.credit(asset, to, amount);
        Ok(())
    }

    /// Grants `spender` the right to move up to `amount` of `asset` owned by `owner`
    pub fn approve(
        &mut self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) {
        self.allowances
            .insert((asset.clone(), owner.clone(), spender.clone()), amount);
    }

    /// Remaining allowance of `spender` over `owner`'s `asset`
    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(&(asset.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Transfer-on-behalf: `spender` moves `owner`'s funds within allowance
    pub fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> AmmResult<()> {
        let allowed = self.allowance(asset, owner, spender);
        if allowed < amount {
            return Err(AmmError::InsufficientBalance {
                account: owner.0.clone(),
                held: allowed,
                needed: amount,
            });
        }
        self.transfer(asset, owner, to, amount)?;
        self.allowances.insert(
            (asset.clone(), owner.clone(), spender.clone()),
            allowed - amount,
        );
        Ok(())
    }

    /// Copy of the full ledger state, used for swap rollback
    pub fn snapshot(&self) -> TokenLedger {
        self.clone()
    }

    /// Restores a previously taken snapshot
    pub fn restore(&mut self, snapshot: TokenLedger) {
        *self = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dai() -> AssetId {
        AssetId("DAI".into())
    }

    fn acc(name: &str) -> AccountId {
        AccountId(name.into())
    }

    #[test]
    fn test_credit_and_transfer() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&dai(), &acc("alice"), 1_000);

        ledger.transfer(&dai(), &acc("alice"), &acc("bob"), 400).unwrap();
        assert_eq!(ledger.balance_of(&dai(), &acc("alice")), 600);
        assert_eq!(ledger.balance_of(&dai(), &acc("bob")), 400);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&dai(), &acc("alice"), 10);

        let result = ledger.transfer(&dai(), &acc("alice"), &acc("bob"), 11);
        assert!(matches!(
            result,
            Err(AmmError::InsufficientBalance { held: 10, needed: 11, .. })
        ));
        // No partial movement
        assert_eq!(ledger.balance_of(&dai(), &acc("alice")), 10);
        assert_eq!(ledger.balance_of(&dai(), &acc("bob")), 0);
    }

    #[test]
    fn test_transfer_from_respects_allowance() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&dai(), &acc("alice"), 1_000);
        ledger.approve(&dai(), &acc("alice"), &acc("router"), 300);

        ledger
            .transfer_from(&dai(), &acc("router"), &acc("alice"), &acc("pool"), 200)
            .unwrap();
        assert_eq!(ledger.balance_of(&dai(), &acc("pool")), 200);
        assert_eq!(ledger.allowance(&dai(), &acc("alice"), &acc("router")), 100);

        let over = ledger.transfer_from(&dai(), &acc("router"), &acc("alice"), &acc("pool"), 101);
        assert!(over.is_err());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&dai(), &acc("alice"), 500);
        let snapshot = ledger.snapshot();

        ledger.transfer(&dai(), &acc("alice"), &acc("bob"), 500).unwrap();
        assert_eq!(ledger.balance_of(&dai(), &acc("alice")), 0);

        ledger.restore(snapshot);
        assert_eq!(ledger.balance_of(&dai(), &acc("alice")), 500);
        assert_eq!(ledger.balance_of(&dai(), &acc("bob")), 0);
    }
}
