//! Pool directory and factory-level configuration.
//!
//! The registry owns one [`ThreadSafePair`] per canonical asset pair and the
//! shared [`FactoryConfig`] every pool consults when minting protocol-fee
//! shares. Changing the fee recipient takes effect for all pools at their
//! next mint or burn.

use crate::domain::pair::ThreadSafePair;
use crate::domain::types::*;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Factory-level settings shared by every pool
#[derive(Debug, Clone, Default)]
pub struct FactoryConfig {
    /// Account credited with protocol-fee shares, none disables the fee
    pub fee_recipient: Option<AccountId>,
}

/// Shared handle to the factory configuration
pub type SharedFactoryConfig = Arc<RwLock<FactoryConfig>>;

/// Directory of pools, one per canonical pair
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    admin: AccountId,
    config: SharedFactoryConfig,
    pools: Arc<RwLock<HashMap<PairKey, ThreadSafePair>>>,
}

impl PoolRegistry {
    /// Creates an empty registry administered by `admin`
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            config: Arc::new(RwLock::new(FactoryConfig::default())),
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Shared factory configuration handle
    pub fn config(&self) -> SharedFactoryConfig {
        self.config.clone()
    }

    /// Sets or clears the protocol-fee recipient. Admin-only.
    pub fn set_fee_recipient(
        &self,
        caller: &AccountId,
        recipient: Option<AccountId>,
    ) -> AmmResult<()> {
        if caller != &self.admin {
            return Err(AmmError::Forbidden(format!(
                "operation restricted to registry admin {}",
                self.admin
            )));
        }
        self.config
            .write()
            .expect("Failed to acquire write lock")
            .fee_recipient = recipient;
        Ok(())
    }

    /// Creates a pool for the pair of `asset_a` and `asset_b`, owned by the
    /// caller. Asset order does not matter; the canonical pair is derived.
    pub fn create_pool(
        &self,
        creator: &AccountId,
        asset_a: AssetId,
        asset_b: AssetId,
        now: Timestamp,
    ) -> AmmResult<ThreadSafePair> {
        let key = PairKey::new(asset_a, asset_b)?;
        let mut pools = self.pools.write().expect("Failed to acquire write lock");
        if pools.contains_key(&key) {
            return Err(AmmError::PoolExists(key.to_string()));
        }
        let pool = ThreadSafePair::new(key.clone(), creator.clone(), now);
        pool.set_factory_config(self.config.clone());
        tracing::info!(pair = %key, creator = %creator, "pool created");
        pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// Looks up the pool for a pair, in either asset order
    pub fn get_pool(&self, asset_a: AssetId, asset_b: AssetId) -> AmmResult<ThreadSafePair> {
        let key = PairKey::new(asset_a, asset_b)?;
        self.pools
            .read()
            .expect("Failed to acquire read lock")
            .get(&key)
            .cloned()
            .ok_or_else(|| AmmError::UnknownPool(key.to_string()))
    }

    /// Canonical keys of all registered pools
    pub fn pool_keys(&self) -> Vec<PairKey> {
        self.pools
            .read()
            .expect("Failed to acquire read lock")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered pools
    pub fn pool_count(&self) -> usize {
        self.pools
            .read()
            .expect("Failed to acquire read lock")
            .len()
    }
}
