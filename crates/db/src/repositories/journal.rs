//! Journal repository: the PostgreSQL transactional committer.
//!
//! A commit runs in one database transaction:
//! 1. Optional `SET LOCAL lock_timeout`
//! 2. `SELECT … FOR UPDATE` on each account in canonical plan order, then
//!    apply the aggregated movement and bump `balance_version`
//! 3. Insert the journal entry and its postings
//! 4. Commit (the deferred balance trigger fires here)
//!
//! Accounts are locked before the inserts so the `KEY SHARE` locks the posting
//! foreign keys take never precede the ordered exclusive locks.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tally_core::ledger::{
    AccountMovement, Direction, JournalEntry, LedgerError, LockPlan, Posting,
};
use tally_shared::types::{AccountId, JournalEntryId, PostingId};
use tally_shared::{IsolationSetting, PostingConfig};

use super::error::classify;
use crate::entities::{accounts, journal_entries, postings};

/// Converts the configured isolation into the `SeaORM` level.
#[must_use]
pub const fn isolation_level(setting: IsolationSetting) -> IsolationLevel {
    match setting {
        IsolationSetting::ReadCommitted => IsolationLevel::ReadCommitted,
        IsolationSetting::RepeatableRead => IsolationLevel::RepeatableRead,
        IsolationSetting::Serializable => IsolationLevel::Serializable,
    }
}

/// Journal repository for committing and reading journal entries.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
    isolation: IsolationSetting,
    lock_timeout_ms: Option<u64>,
}

impl JournalRepository {
    /// Creates a journal repository with default committer settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_settings(db, &PostingConfig::default())
    }

    /// Creates a journal repository using the committer settings in `config`.
    #[must_use]
    pub fn with_settings(db: DatabaseConnection, config: &PostingConfig) -> Self {
        Self {
            db,
            isolation: config.isolation,
            lock_timeout_ms: config.lock_timeout_ms,
        }
    }

    /// Atomically applies `entry`'s balance changes and records it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] if an account row is missing
    /// - [`LedgerError::Concurrency`] on serialization failure, deadlock, or
    ///   lock timeout
    /// - [`LedgerError::Persistence`] for any other database failure
    pub async fn post(&self, entry: &JournalEntry) -> Result<JournalEntry, LedgerError> {
        let plan = LockPlan::for_entry(entry)?;

        let txn = self
            .db
            .begin_with_config(Some(isolation_level(self.isolation)), None)
            .await
            .map_err(classify)?;

        if let Some(ms) = self.lock_timeout_ms {
            txn.execute_unprepared(&format!("SET LOCAL lock_timeout = '{ms}ms'"))
                .await
                .map_err(classify)?;
        }

        // Dropping `txn` on any early return rolls everything back.
        for movement in plan.movements() {
            apply_movement(&txn, movement).await?;
        }

        insert_entry(&txn, entry).await?;

        txn.commit().await.map_err(classify)?;

        tracing::debug!(
            entry_id = %entry.id,
            accounts = plan.len(),
            isolation = ?self.isolation,
            "journal entry committed"
        );

        Ok(entry.clone())
    }

    /// Fetches an entry with its postings in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the query fails or a stored
    /// posting is malformed.
    pub async fn get_entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        let Some(header) = journal_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(classify)?
        else {
            return Ok(None);
        };

        let rows = postings::Entity::find()
            .filter(postings::Column::JournalEntryId.eq(header.id))
            .order_by_asc(postings::Column::Position)
            .all(&self.db)
            .await
            .map_err(classify)?;

        let postings = rows
            .into_iter()
            .map(model_to_posting)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(JournalEntry {
            id: JournalEntryId::from_uuid(header.id),
            description: header.description,
            status: header.status.into(),
            created_at: header.created_at.with_timezone(&Utc),
            postings,
        }))
    }
}

/// Locks one account row, adds the net movement, and bumps its version.
async fn apply_movement(
    txn: &DatabaseTransaction,
    movement: &AccountMovement,
) -> Result<(), LedgerError> {
    let row = accounts::Entity::find_by_id(movement.account_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(classify)?
        .ok_or(LedgerError::AccountNotFound(movement.account_id))?;

    let (balance, version) = next_balance(
        movement.account_id,
        row.balance,
        row.balance_version,
        movement.net_amount,
    )?;

    let mut active: accounts::ActiveModel = row.into();
    active.balance = Set(balance);
    active.balance_version = Set(version);
    active.updated_at = Set(Utc::now().into());
    active.update(txn).await.map_err(classify)?;

    Ok(())
}

/// Balance and version after applying `net_amount`, or `Persistence` if
/// either leaves its range.
fn next_balance(
    account_id: AccountId,
    balance: Decimal,
    version: i64,
    net_amount: Decimal,
) -> Result<(Decimal, i64), LedgerError> {
    let balance = balance.checked_add(net_amount).ok_or_else(|| {
        LedgerError::Persistence(format!("balance overflow on account {account_id}"))
    })?;
    let version = version.checked_add(1).ok_or_else(|| {
        LedgerError::Persistence(format!("balance version overflow on account {account_id}"))
    })?;
    Ok((balance, version))
}

/// Inserts the entry header and its postings.
async fn insert_entry(txn: &DatabaseTransaction, entry: &JournalEntry) -> Result<(), LedgerError> {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        description: Set(entry.description.clone()),
        status: Set(entry.status.into()),
        created_at: Set(entry.created_at.into()),
    }
    .insert(txn)
    .await
    .map_err(classify)?;

    let mut rows = Vec::with_capacity(entry.postings.len());
    for (position, posting) in entry.postings.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| LedgerError::Persistence("too many postings in one entry".into()))?;
        rows.push(postings::ActiveModel {
            id: Set(posting.id.into_inner()),
            journal_entry_id: Set(entry.id.into_inner()),
            account_id: Set(posting.account_id.into_inner()),
            position: Set(position),
            amount: Set(posting.amount),
            direction: Set(i16::from(posting.direction.as_i8())),
        });
    }

    postings::Entity::insert_many(rows)
        .exec_without_returning(txn)
        .await
        .map_err(classify)?;

    Ok(())
}

fn model_to_posting(model: postings::Model) -> Result<Posting, LedgerError> {
    let direction = i8::try_from(model.direction)
        .ok()
        .and_then(|flag| Direction::try_from(flag).ok())
        .ok_or_else(|| {
            LedgerError::Persistence(format!(
                "posting {} has invalid direction {}",
                model.id, model.direction
            ))
        })?;

    Ok(Posting {
        id: PostingId::from_uuid(model.id),
        journal_entry_id: JournalEntryId::from_uuid(model.journal_entry_id),
        account_id: AccountId::from_uuid(model.account_id),
        amount: model.amount,
        direction,
    })
}
