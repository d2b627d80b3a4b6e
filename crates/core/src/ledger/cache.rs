//! Cache invalidation after committed postings.
//!
//! Read paths outside the posting engine cache balances, account details, and
//! account listings. Once an entry commits, those keys are stale and are
//! deleted. Invalidation is best-effort: a failed delete is logged and
//! otherwise ignored, the commit stands.

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tally_shared::CacheConfig;
use tally_shared::types::{AccountId, UserId};
use thiserror::Error;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or refused the command.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Cache capability used by the posting engine. Only deletion is needed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Removes `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Key layout shared with the read side.
pub struct CacheKey;

impl CacheKey {
    /// `balance:{account_id}`
    #[must_use]
    pub fn balance(account_id: AccountId) -> String {
        format!("balance:{account_id}")
    }

    /// `account:{account_id}`
    #[must_use]
    pub fn account(account_id: AccountId) -> String {
        format!("account:{account_id}")
    }

    /// `accounts:list:{user_id}`
    #[must_use]
    pub fn accounts_for_user(user_id: UserId) -> String {
        format!("accounts:list:{user_id}")
    }

    /// `accounts:list`
    #[must_use]
    pub fn all_accounts() -> String {
        "accounts:list".to_string()
    }
}

/// An account touched by a commit, with its owner when the lookup succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchedAccount {
    /// The account whose balance changed.
    pub account_id: AccountId,
    /// Owner, or `None` if it could not be looked up.
    pub user_id: Option<UserId>,
}

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys a delete was issued for.
    pub attempted: usize,
    /// Deletes that failed.
    pub failed: usize,
}

/// Deletes stale keys through an optional, injected [`CacheStore`].
#[derive(Clone, Default)]
pub struct CacheInvalidator {
    store: Option<Arc<dyn CacheStore>>,
}

impl std::fmt::Debug for CacheInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl CacheInvalidator {
    /// Invalidates through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    /// An invalidator that does nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Returns true if a store is attached.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Keys to delete after a commit touching `touched`, without duplicates.
    ///
    /// Per account: balance, detail, and the owner's listing. Then the global
    /// listing, last.
    #[must_use]
    pub fn keys_for(touched: &[TouchedAccount]) -> Vec<String> {
        let mut keys = Vec::with_capacity(touched.len() * 3 + 1);
        for account in touched {
            keys.push(CacheKey::balance(account.account_id));
            keys.push(CacheKey::account(account.account_id));
            if let Some(user_id) = account.user_id {
                let key = CacheKey::accounts_for_user(user_id);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys.push(CacheKey::all_accounts());
        keys
    }

    /// Deletes every key for `touched`. Never fails.
    pub async fn invalidate_accounts(&self, touched: &[TouchedAccount]) -> InvalidationReport {
        self.invalidate_keys(Self::keys_for(touched)).await
    }

    /// Deletes the listings that change when `user_id` opens an account.
    pub async fn invalidate_listings(&self, user_id: UserId) -> InvalidationReport {
        self.invalidate_keys(vec![
            CacheKey::accounts_for_user(user_id),
            CacheKey::all_accounts(),
        ])
        .await
    }

    async fn invalidate_keys(&self, keys: Vec<String>) -> InvalidationReport {
        let Some(store) = &self.store else {
            return InvalidationReport::default();
        };

        let mut report = InvalidationReport {
            attempted: keys.len(),
            failed: 0,
        };
        for key in &keys {
            if let Err(error) = store.delete(key).await {
                report.failed += 1;
                tracing::warn!(key = %key, error = %error, "cache invalidation failed");
            }
        }
        report
    }
}

/// In-process cache backed by `moka`.
///
/// Read paths populate it with [`insert`](Self::insert); the posting engine
/// only deletes from it.
#[derive(Clone)]
pub struct MokaCacheStore {
    cache: Cache<String, Arc<Value>>,
}

impl MokaCacheStore {
    /// Creates a store with the given capacity and time-to-live.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache }
    }

    /// Creates a store from cache configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_config(config.max_capacity, config.ttl_secs)
    }

    /// Caches a value.
    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        self.cache.insert(key.into(), Arc::new(value)).await;
    }

    /// Returns a cached value.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.cache.get(key).await
    }
}

impl Default for MokaCacheStore {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
