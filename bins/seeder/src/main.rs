//! Database seeder for Tally development and testing.
//!
//! Opens a demo user's checking and savings accounts and posts an opening
//! transfer between them through the ledger service.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tally_core::ledger::{
    Account, AccountType, CacheInvalidator, LedgerService, MokaCacheStore, NewAccount,
    RetryPolicy,
};
use tally_db::{PostgresLedgerRepository, connect_with};
use tally_shared::{AppConfig, AppError, AppResult};
use tally_shared::types::{CurrencyCode, UserId};

/// Demo user ID (consistent for all seeds)
const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000002";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let repository = Arc::new(PostgresLedgerRepository::with_settings(db, &config.posting));
    let mut service = LedgerService::new(repository)
        .with_retry_policy(RetryPolicy::from_config(&config.posting));
    if config.cache.enabled {
        let store = Arc::new(MokaCacheStore::from_config(&config.cache));
        service = service.with_invalidator(CacheInvalidator::new(store));
    }

    let user_id = UserId::from_uuid(Uuid::parse_str(DEMO_USER_ID)?);

    seed(&service, user_id).await?;

    info!("Seeding complete");
    Ok(())
}

/// Opens the demo accounts and posts the opening transfer, unless the demo
/// user already has accounts.
async fn seed(service: &LedgerService, user_id: UserId) -> AppResult<()> {
    let existing = service.accounts_for_user(user_id).await?;
    if !existing.is_empty() {
        info!(accounts = existing.len(), "Demo accounts already exist, skipping");
        return Ok(());
    }

    let checking = open(service, user_id, "Demo Checking", AccountType::Checking).await?;
    let savings = open(service, user_id, "Demo Savings", AccountType::Savings).await?;

    let entry = service
        .post_transfer(checking.id, savings.id, "250.00", "Opening savings transfer")
        .await?;
    info!(entry_id = %entry.id, "Posted opening transfer");

    for account in service.accounts_for_user(user_id).await? {
        info!(
            account_id = %account.id,
            name = %account.name,
            balance = %account.balance,
            version = account.balance_version,
            "Seeded account"
        );
    }

    Ok(())
}

async fn open(
    service: &LedgerService,
    user_id: UserId,
    name: &str,
    account_type: AccountType,
) -> AppResult<Account> {
    let currency =
        CurrencyCode::parse("USD").map_err(|e| AppError::Internal(format!("demo currency: {e}")))?;
    let account = service
        .create_account(NewAccount {
            user_id,
            name: name.to_string(),
            account_type,
            currency,
        })
        .await?;
    Ok(account)
}
