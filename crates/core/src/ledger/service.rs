//! Ledger service: the posting engine's entry point.
//!
//! `post_transaction` runs the whole pipeline:
//! 1. Validate the raw postings into a [`JournalEntry`]
//! 2. Plan the canonical lock order
//! 3. Commit through the repository under the retry policy
//! 4. Invalidate cached reads for every touched account
//!
//! Validation failures never reach the repository.

use std::sync::Arc;
use tally_shared::types::{AccountId, JournalEntryId, UserId};
use tokio::time::Instant;

use super::cache::{CacheInvalidator, TouchedAccount};
use super::error::LedgerError;
use super::lock_order::LockPlan;
use super::repository::LedgerRepository;
use super::retry::{RetryError, RetryPolicy, retry};
use super::types::{Account, Direction, JournalEntry, NewAccount, PostingRequest};
use super::validation::validate_entry;

/// Posts balanced journal entries and keeps caches honest.
#[derive(Clone)]
pub struct LedgerService {
    repository: Arc<dyn LedgerRepository>,
    invalidator: CacheInvalidator,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("invalidator", &self.invalidator)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl LedgerService {
    /// Creates a service over `repository` with the default retry policy and
    /// no cache.
    #[must_use]
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self {
            repository,
            invalidator: CacheInvalidator::disabled(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the cache invalidator.
    #[must_use]
    pub fn with_invalidator(mut self, invalidator: CacheInvalidator) -> Self {
        self.invalidator = invalidator;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The active retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Validates and atomically posts a journal entry.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] for malformed or unbalanced input
    /// - [`LedgerError::AccountNotFound`] if a referenced account is missing
    /// - [`LedgerError::TransactionFailed`] when contention outlasts the retries
    /// - [`LedgerError::Persistence`] for any other storage failure
    pub async fn post_transaction(
        &self,
        description: &str,
        postings: &[PostingRequest],
    ) -> Result<JournalEntry, LedgerError> {
        self.post(description, postings, None).await
    }

    /// Like [`post_transaction`](Self::post_transaction), but gives up with
    /// [`LedgerError::Timeout`] once `deadline` passes.
    ///
    /// An attempt cut short by the deadline is dropped, which rolls back its
    /// database transaction.
    ///
    /// # Errors
    ///
    /// Same as `post_transaction`, plus [`LedgerError::Timeout`].
    pub async fn post_transaction_with_deadline(
        &self,
        description: &str,
        postings: &[PostingRequest],
        deadline: Instant,
    ) -> Result<JournalEntry, LedgerError> {
        self.post(description, postings, Some(deadline)).await
    }

    /// Moves `amount` from one account to another.
    ///
    /// Builds two postings: `from` is credited, `to` is debited.
    ///
    /// # Errors
    ///
    /// Same as [`post_transaction`](Self::post_transaction).
    pub async fn post_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: &str,
        description: &str,
    ) -> Result<JournalEntry, LedgerError> {
        let postings = [
            PostingRequest::new(from.to_string(), amount, Direction::Credit.as_i8()),
            PostingRequest::new(to.to_string(), amount, Direction::Debit.as_i8()),
        ];
        self.post_transaction(description, &postings).await
    }

    /// Opens an account and drops the cached listings it appears in.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the store rejects the insert.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let account = self.repository.create_account(input).await?;
        self.invalidator.invalidate_listings(account.user_id).await;
        tracing::info!(account_id = %account.id, user_id = %account.user_id, "account opened");
        Ok(account)
    }

    /// Fetches one account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if it does not exist.
    pub async fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.repository.get_account(id).await
    }

    /// Lists every account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] on storage failure.
    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.repository.list_accounts().await
    }

    /// Lists one user's accounts.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] on storage failure.
    pub async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        self.repository.list_accounts_by_user(user_id).await
    }

    /// Fetches a committed journal entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] on storage failure.
    pub async fn journal_entry(
        &self,
        id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        self.repository.get_journal_entry(id).await
    }

    async fn post(
        &self,
        description: &str,
        postings: &[PostingRequest],
        deadline: Option<Instant>,
    ) -> Result<JournalEntry, LedgerError> {
        let entry = validate_entry(description, postings)?;
        let plan = LockPlan::for_entry(&entry)?;

        let repository = &self.repository;
        let entry_ref = &entry;
        let committed = retry(
            &self.retry_policy,
            deadline,
            LedgerError::is_retryable,
            move |_| repository.post_transaction(entry_ref),
        )
        .await
        .map_err(|err| match err {
            RetryError::Fatal { error, .. } => error,
            RetryError::Exhausted { attempts, last } => LedgerError::TransactionFailed {
                attempts,
                last: Box::new(last),
            },
            RetryError::DeadlineExceeded { attempts } => LedgerError::Timeout { attempts },
        })?;

        tracing::info!(
            entry_id = %committed.id,
            postings = committed.postings.len(),
            accounts = plan.len(),
            "journal entry posted"
        );

        if self.invalidator.is_enabled() {
            let touched = self.touched_accounts(&plan).await;
            let report = self.invalidator.invalidate_accounts(&touched).await;
            if report.failed > 0 {
                tracing::warn!(
                    entry_id = %committed.id,
                    failed = report.failed,
                    attempted = report.attempted,
                    "stale cache entries may remain"
                );
            }
        }

        Ok(committed)
    }

    async fn touched_accounts(&self, plan: &LockPlan) -> Vec<TouchedAccount> {
        let mut touched = Vec::with_capacity(plan.len());
        for account_id in plan.account_ids() {
            let user_id = match self.repository.get_account(account_id).await {
                Ok(account) => Some(account.user_id),
                Err(error) => {
                    tracing::warn!(
                        account_id = %account_id,
                        error = %error,
                        "owner lookup for cache invalidation failed"
                    );
                    None
                }
            };
            touched.push(TouchedAccount {
                account_id,
                user_id,
            });
        }
        touched
    }
}
