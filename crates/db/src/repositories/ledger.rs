//! PostgreSQL implementation of the ledger repository capability.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tally_core::ledger::{Account, JournalEntry, LedgerError, LedgerRepository, NewAccount};
use tally_shared::PostingConfig;
use tally_shared::types::{AccountId, JournalEntryId, UserId};

use super::account::AccountRepository;
use super::journal::JournalRepository;

/// Durable [`LedgerRepository`] over a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerRepository {
    accounts: AccountRepository,
    journal: JournalRepository,
}

impl PostgresLedgerRepository {
    /// Creates a repository with default committer settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_settings(db, &PostingConfig::default())
    }

    /// Creates a repository using the isolation level and lock timeout in
    /// `config`.
    #[must_use]
    pub fn with_settings(db: DatabaseConnection, config: &PostingConfig) -> Self {
        Self {
            accounts: AccountRepository::new(db.clone()),
            journal: JournalRepository::with_settings(db, config),
        }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        self.accounts.create_account(input).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.accounts.list_accounts().await
    }

    async fn list_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        self.accounts.list_by_user(user_id).await
    }

    async fn post_transaction(&self, entry: &JournalEntry) -> Result<JournalEntry, LedgerError> {
        self.journal.post(entry).await
    }

    async fn get_journal_entry(
        &self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        self.journal.get_entry(id).await
    }
}
