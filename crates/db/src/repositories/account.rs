//! Account repository for account database operations.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tally_core::ledger::{Account, LedgerError, NewAccount};
use tally_shared::types::{AccountId, CurrencyCode, UserId};

use super::error::classify;
use crate::entities::accounts;

/// Account repository for create and read operations.
///
/// Balance changes go through [`JournalRepository`](super::JournalRepository)
/// only.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Opens an account with zero balance and version.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the insert fails.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let now = Utc::now().into();

        let model = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            user_id: Set(input.user_id.into_inner()),
            name: Set(input.name),
            account_type: Set(input.account_type.into()),
            currency: Set(input.currency.as_str().to_string()),
            balance: Set(Decimal::ZERO),
            balance_version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(classify)?;

        model_to_account(model)
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the query fails.
    pub async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(classify)?
            .map(model_to_account)
            .transpose()
    }

    /// Lists all accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the query fails.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
            .map_err(classify)?
            .into_iter()
            .map(model_to_account)
            .collect()
    }

    /// Lists one user's accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Account>, LedgerError> {
        accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.into_inner()))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
            .map_err(classify)?
            .into_iter()
            .map(model_to_account)
            .collect()
    }
}

/// Converts a row into the domain account.
///
/// # Errors
///
/// Returns [`LedgerError::Persistence`] if the stored currency is malformed.
pub fn model_to_account(model: accounts::Model) -> Result<Account, LedgerError> {
    let currency = CurrencyCode::parse(&model.currency)
        .map_err(|e| LedgerError::Persistence(format!("account {}: {e}", model.id)))?;

    Ok(Account {
        id: AccountId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        name: model.name,
        account_type: model.account_type.into(),
        currency,
        balance: model.balance,
        balance_version: model.balance_version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

