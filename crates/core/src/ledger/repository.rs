//! Storage capability consumed by the posting engine.
//!
//! Implementations: `tally_db::PostgresLedgerRepository` (durable) and
//! [`InMemoryLedgerRepository`](super::memory::InMemoryLedgerRepository).

use async_trait::async_trait;
use tally_shared::types::{AccountId, JournalEntryId, UserId};

use super::error::LedgerError;
use super::types::{Account, JournalEntry, NewAccount};

/// Account storage plus the atomic commit of journal entries.
///
/// `post_transaction` is the Transactional Committer. For every account of the
/// entry's [`LockPlan`](super::lock_order::LockPlan), in plan order, it takes
/// an exclusive lock, adds the net movement to the balance and increments
/// `balance_version` by one; it then writes the entry and its postings. All of
/// it commits or none of it does.
///
/// Errors must already be classified: a missing account is
/// [`LedgerError::AccountNotFound`], lock contention is
/// [`LedgerError::Concurrency`], anything else is
/// [`LedgerError::Persistence`].
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Opens an account with zero balance and version.
    async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError>;

    /// Fetches one account.
    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Lists every account.
    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Lists the accounts owned by one user.
    async fn list_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError>;

    /// Atomically commits a validated entry and applies its balance changes.
    async fn post_transaction(&self, entry: &JournalEntry) -> Result<JournalEntry, LedgerError>;

    /// Fetches a committed entry with its postings in submission order.
    async fn get_journal_entry(
        &self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, LedgerError>;
}
