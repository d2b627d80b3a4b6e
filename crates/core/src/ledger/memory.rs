//! In-memory ledger repository.
//!
//! Each account row sits behind its own `tokio::sync::Mutex`, standing in for
//! a database row lock. Commits lock rows in canonical plan order, so the
//! store has the same deadlock behaviour as the durable one.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tally_shared::types::{AccountId, JournalEntryId, UserId};
use tokio::sync::{Mutex, RwLock};

use super::error::LedgerError;
use super::lock_order::LockPlan;
use super::repository::LedgerRepository;
use super::types::{Account, JournalEntry, NewAccount};

/// Ledger repository backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerRepository {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<Account>>>>,
    entries: Mutex<HashMap<JournalEntryId, JournalEntry>>,
}

impl InMemoryLedgerRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed account, replacing any account with the same id.
    ///
    /// Lets tests and seeders start accounts from a non-zero balance.
    pub async fn insert_account(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.id, Arc::new(Mutex::new(account)));
    }

    /// Number of committed journal entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn snapshot_all(&self) -> Vec<Account> {
        let rows: Vec<Arc<Mutex<Account>>> =
            self.accounts.read().await.values().cloned().collect();

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(row.lock().await.clone());
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        accounts
    }
}

/// Balance and version after applying `net_amount`, or `Persistence` if
/// either leaves its range.
fn next_balance(account: &Account, net_amount: Decimal) -> Result<(Decimal, i64), LedgerError> {
    let balance = account.balance.checked_add(net_amount).ok_or_else(|| {
        LedgerError::Persistence(format!("balance overflow on account {}", account.id))
    })?;
    let version = account.balance_version.checked_add(1).ok_or_else(|| {
        LedgerError::Persistence(format!("balance version overflow on account {}", account.id))
    })?;
    Ok((balance, version))
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let account = Account::open(input);
        self.insert_account(account.clone()).await;
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let row = self
            .accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))?;
        let account = row.lock().await.clone();
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.snapshot_all().await)
    }

    async fn list_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.snapshot_all().await;
        accounts.retain(|a| a.user_id == user_id);
        Ok(accounts)
    }

    async fn post_transaction(&self, entry: &JournalEntry) -> Result<JournalEntry, LedgerError> {
        let plan = LockPlan::for_entry(entry)?;

        let rows = {
            let accounts = self.accounts.read().await;
            plan.account_ids()
                .map(|id| {
                    accounts
                        .get(&id)
                        .cloned()
                        .ok_or(LedgerError::AccountNotFound(id))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        // Canonical order; guards are held until the entry is recorded.
        let mut guards = Vec::with_capacity(rows.len());
        for row in &rows {
            guards.push(row.lock().await);
        }

        let mut entries = self.entries.lock().await;
        if entries.contains_key(&entry.id) {
            return Err(LedgerError::Persistence(format!(
                "journal entry {} already exists",
                entry.id
            )));
        }

        // Every new balance is computed before any row is touched.
        let updates = guards
            .iter()
            .zip(plan.movements())
            .map(|(account, movement)| next_balance(account, movement.net_amount))
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now();
        for (account, (balance, version)) in guards.iter_mut().zip(updates) {
            account.balance = balance;
            account.balance_version = version;
            account.updated_at = now;
        }
        entries.insert(entry.id, entry.clone());

        Ok(entry.clone())
    }

    async fn get_journal_entry(
        &self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        Ok(self.entries.lock().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{AccountType, PostingRequest};
    use crate::ledger::validation::validate_entry;
    use rust_decimal_macros::dec;
    use tally_shared::types::CurrencyCode;

    async fn open(repo: &InMemoryLedgerRepository, user_id: UserId, name: &str) -> Account {
        repo.create_account(NewAccount {
            user_id,
            name: name.to_string(),
            account_type: AccountType::Checking,
            currency: CurrencyCode::parse("USD").unwrap(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_post_applies_net_movement_once_per_account() {
        let repo = InMemoryLedgerRepository::new();
        let user = UserId::new();
        let a = open(&repo, user, "A").await;
        let b = open(&repo, user, "B").await;

        let entry = validate_entry(
            "split",
            &[
                PostingRequest::new(a.id.to_string(), "5.00", 1),
                PostingRequest::new(a.id.to_string(), "3.00", 1),
                PostingRequest::new(b.id.to_string(), "8.00", -1),
            ],
        )
        .unwrap();
        repo.post_transaction(&entry).await.unwrap();

        let a = repo.get_account(a.id).await.unwrap();
        let b = repo.get_account(b.id).await.unwrap();
        assert_eq!(a.balance, dec!(8.00));
        assert_eq!(a.balance_version, 1);
        assert_eq!(b.balance, dec!(-8.00));
        assert_eq!(b.balance_version, 1);

        let stored = repo.get_journal_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored, entry);
    }

    #[tokio::test]
    async fn test_missing_account_changes_nothing() {
        let repo = InMemoryLedgerRepository::new();
        let a = open(&repo, UserId::new(), "A").await;
        let ghost = AccountId::new();

        let entry = validate_entry(
            "to nowhere",
            &[
                PostingRequest::new(a.id.to_string(), "10.00", -1),
                PostingRequest::new(ghost.to_string(), "10.00", 1),
            ],
        )
        .unwrap();

        let err = repo.post_transaction(&entry).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(id) if id == ghost));

        let a = repo.get_account(a.id).await.unwrap();
        assert_eq!(a.balance, Decimal::ZERO);
        assert_eq!(a.balance_version, 0);
        assert_eq!(repo.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_entries_are_write_once() {
        let repo = InMemoryLedgerRepository::new();
        let user = UserId::new();
        let a = open(&repo, user, "A").await;
        let b = open(&repo, user, "B").await;

        let entry = validate_entry(
            "once",
            &[
                PostingRequest::new(a.id.to_string(), "1.00", -1),
                PostingRequest::new(b.id.to_string(), "1.00", 1),
            ],
        )
        .unwrap();
        repo.post_transaction(&entry).await.unwrap();

        let err = repo.post_transaction(&entry).await.unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert_eq!(repo.get_account(a.id).await.unwrap().balance_version, 1);
    }

    #[tokio::test]
    async fn test_list_accounts_by_user() {
        let repo = InMemoryLedgerRepository::new();
        let alice = UserId::new();
        let bob = UserId::new();
        open(&repo, alice, "Alice checking").await;
        open(&repo, alice, "Alice savings").await;
        open(&repo, bob, "Bob checking").await;

        assert_eq!(repo.list_accounts().await.unwrap().len(), 3);
        let alices = repo.list_accounts_by_user(alice).await.unwrap();
        assert_eq!(alices.len(), 2);
        assert!(alices.iter().all(|a| a.user_id == alice));
    }

    #[tokio::test]
    async fn test_get_unknown_account() {
        let repo = InMemoryLedgerRepository::new();
        let id = AccountId::new();
        assert!(matches!(
            repo.get_account(id).await,
            Err(LedgerError::AccountNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_balance_overflow_leaves_every_account_untouched() {
        let repo = InMemoryLedgerRepository::new();
        let user = UserId::new();
        let first = open(&repo, user, "first").await;
        let second = open(&repo, user, "second").await;
        let (low, high) = if first.id < second.id {
            (first, second)
        } else {
            (second, first)
        };
        // The later account in lock order is the one that cannot absorb the credit.
        repo.insert_account(Account {
            balance: Decimal::MAX,
            ..high.clone()
        })
        .await;

        let entry = validate_entry(
            "one too many",
            &[
                PostingRequest::new(low.id.to_string(), "1", -1),
                PostingRequest::new(high.id.to_string(), "1", 1),
            ],
        )
        .unwrap();

        let err = repo.post_transaction(&entry).await.unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert!(!err.is_retryable());

        let low = repo.get_account(low.id).await.unwrap();
        let high = repo.get_account(high.id).await.unwrap();
        assert_eq!(low.balance, Decimal::ZERO);
        assert_eq!(low.balance_version, 0);
        assert_eq!(high.balance, Decimal::MAX);
        assert_eq!(high.balance_version, 0);
        assert_eq!(repo.entry_count().await, 0);
    }
}
