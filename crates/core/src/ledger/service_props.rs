//! Property-based tests for `LedgerService` against the in-memory store.
//!
//! - Property 5: Committed balances equal the sum of posted movements
//! - Property 6: Each entry bumps each touched account's version exactly once
//! - Property 7: Rejected entries leave every account untouched

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tally_shared::types::{AccountId, CurrencyCode, UserId};

use super::memory::InMemoryLedgerRepository;
use super::service::LedgerService;
use super::types::{AccountType, NewAccount, PostingRequest};

const ACCOUNTS: usize = 4;

/// A transfer between two account slots.
#[derive(Debug, Clone)]
struct Transfer {
    from: usize,
    to: usize,
    amount: Decimal,
}

fn transfer() -> impl Strategy<Value = Transfer> {
    (0..ACCOUNTS, 0..ACCOUNTS, 1i64..1_000_000i64).prop_map(|(from, to, cents)| Transfer {
        from,
        to,
        amount: Decimal::new(cents, 2),
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn open_accounts(service: &LedgerService) -> Vec<AccountId> {
    let user = UserId::new();
    let mut ids = Vec::with_capacity(ACCOUNTS);
    for n in 0..ACCOUNTS {
        let account = service
            .create_account(NewAccount {
                user_id: user,
                name: format!("acct-{n}"),
                account_type: AccountType::Cash,
                currency: CurrencyCode::parse("EUR").unwrap(),
            })
            .await
            .unwrap();
        ids.push(account.id);
    }
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // =========================================================================
    // Property 5 + 6: Balances and versions track committed entries
    // =========================================================================

    #[test]
    fn prop_balances_and_versions_track_entries(
        transfers in prop::collection::vec(transfer(), 1..20),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let service = LedgerService::new(Arc::new(InMemoryLedgerRepository::new()));
            let ids = open_accounts(&service).await;

            let mut expected_balance: HashMap<AccountId, Decimal> = HashMap::new();
            let mut expected_version: HashMap<AccountId, i64> = HashMap::new();

            for t in &transfers {
                let (from, to) = (ids[t.from], ids[t.to]);
                service
                    .post_transfer(from, to, &t.amount.to_string(), "prop")
                    .await
                    .unwrap();

                *expected_balance.entry(from).or_default() -= t.amount;
                *expected_balance.entry(to).or_default() += t.amount;
                *expected_version.entry(from).or_default() += 1;
                if from != to {
                    *expected_version.entry(to).or_default() += 1;
                }
            }

            let mut total = Decimal::ZERO;
            for id in &ids {
                let account = service.account(*id).await.unwrap();
                assert_eq!(
                    account.balance,
                    expected_balance.get(id).copied().unwrap_or_default()
                );
                assert_eq!(
                    account.balance_version,
                    expected_version.get(id).copied().unwrap_or_default()
                );
                total += account.balance;
            }
            assert_eq!(total, Decimal::ZERO);
        });
    }

    // =========================================================================
    // Property 7: Rejected entries leave every account untouched
    // =========================================================================

    #[test]
    fn prop_rejected_entry_changes_nothing(
        debit_cents in 1i64..1_000_000i64,
        skew_cents in 1i64..1_000i64,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let service = LedgerService::new(Arc::new(InMemoryLedgerRepository::new()));
            let ids = open_accounts(&service).await;

            let debit = Decimal::new(debit_cents, 2);
            let credit = Decimal::new(debit_cents + skew_cents, 2);
            let result = service
                .post_transaction(
                    "skewed",
                    &[
                        PostingRequest::new(ids[0].to_string(), debit.to_string(), 1),
                        PostingRequest::new(ids[1].to_string(), credit.to_string(), -1),
                    ],
                )
                .await;
            assert!(result.is_err());

            for id in &ids {
                let account = service.account(*id).await.unwrap();
                assert_eq!(account.balance, Decimal::ZERO);
                assert_eq!(account.balance_version, 0);
            }
        });
    }
}
