//! Property-based tests for posting validation and lock planning.
//!
//! - Property 1: Balanced entries are accepted and net to zero
//! - Property 2: Unbalanced entries are rejected with the exact imbalance
//! - Property 3: Lock order ignores submission order
//! - Property 4: Aggregation preserves the net movement
//! - Property 5: Amounts at the edge of the decimal range never panic

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::error::ValidationError;
use super::lock_order::LockPlan;
use super::types::PostingRequest;
use super::validation::{parse_amount, validate_entry};

/// Strategy to generate amounts from 0.01 to 1,000,000.00.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate amounts within 1,000 of `Decimal::MAX`.
fn near_max_amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000).prop_map(|offset| Decimal::MAX - Decimal::from(offset))
}

/// Strategy to generate a small pool of accounts.
fn account_pool() -> impl Strategy<Value = Vec<AccountId>> {
    (2usize..6).prop_map(|n| (0..n).map(|_| AccountId::new()).collect())
}

/// Builds `legs` debits on arbitrary accounts plus one balancing credit.
fn balanced_requests(
    accounts: &[AccountId],
    legs: &[(usize, Decimal)],
    credit_account: usize,
) -> Vec<PostingRequest> {
    let mut total = Decimal::ZERO;
    let mut requests: Vec<PostingRequest> = legs
        .iter()
        .map(|(idx, amount)| {
            total += *amount;
            PostingRequest::new(accounts[idx % accounts.len()].to_string(), amount.to_string(), 1)
        })
        .collect();
    requests.push(PostingRequest::new(
        accounts[credit_account % accounts.len()].to_string(),
        total.to_string(),
        -1,
    ));
    requests
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Balanced entries are accepted and net to zero
    // =========================================================================

    #[test]
    fn prop_balanced_entry_accepted(
        accounts in account_pool(),
        legs in prop::collection::vec((0usize..8, positive_amount()), 1..8),
        credit_account in 0usize..8,
    ) {
        let requests = balanced_requests(&accounts, &legs, credit_account);

        let entry = validate_entry("prop", &requests).unwrap();

        prop_assert_eq!(entry.postings.len(), requests.len());
        prop_assert_eq!(entry.net_amount(), Some(Decimal::ZERO));
        for posting in &entry.postings {
            prop_assert_eq!(posting.journal_entry_id, entry.id);
        }
    }

    // =========================================================================
    // Property 2: Unbalanced entries are rejected with the exact imbalance
    // =========================================================================

    #[test]
    fn prop_unbalanced_entry_rejected(
        debit in positive_amount(),
        skew in positive_amount(),
    ) {
        let credit = debit + skew;
        let requests = [
            PostingRequest::new(AccountId::new().to_string(), debit.to_string(), 1),
            PostingRequest::new(AccountId::new().to_string(), credit.to_string(), -1),
        ];

        let err = validate_entry("prop", &requests).unwrap_err();

        prop_assert_eq!(err, ValidationError::Unbalanced { imbalance: -skew });
    }

    #[test]
    fn prop_amount_text_round_trips(amount in positive_amount()) {
        prop_assert_eq!(parse_amount(&amount.to_string()), Some(amount));
    }

    #[test]
    fn prop_signed_amount_text_rejected(amount in positive_amount()) {
        prop_assert_eq!(parse_amount(&format!("-{amount}")), None);
        prop_assert_eq!(parse_amount(&format!("+{amount}")), None);
    }

    // =========================================================================
    // Property 3: Lock order ignores submission order
    // =========================================================================

    #[test]
    fn prop_lock_order_is_permutation_invariant(
        accounts in account_pool(),
        legs in prop::collection::vec((0usize..8, positive_amount()), 1..8),
        credit_account in 0usize..8,
        seed in any::<u64>(),
    ) {
        let requests = balanced_requests(&accounts, &legs, credit_account);
        let mut shuffled = requests.clone();
        // Deterministic rotation plus reversal stands in for a shuffle.
        let len = shuffled.len();
        let rotation = usize::try_from(seed % len as u64).unwrap();
        shuffled.rotate_left(rotation);
        if seed % 2 == 0 {
            shuffled.reverse();
        }

        let original = LockPlan::for_entry(&validate_entry("a", &requests).unwrap()).unwrap();
        let permuted = LockPlan::for_entry(&validate_entry("b", &shuffled).unwrap()).unwrap();

        prop_assert_eq!(&original, &permuted);
        let ids: Vec<AccountId> = original.account_ids().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(ids, sorted);
    }

    // =========================================================================
    // Property 4: Aggregation preserves the net movement
    // =========================================================================

    #[test]
    fn prop_movements_sum_to_zero(
        accounts in account_pool(),
        legs in prop::collection::vec((0usize..8, positive_amount()), 1..8),
        credit_account in 0usize..8,
    ) {
        let requests = balanced_requests(&accounts, &legs, credit_account);
        let entry = validate_entry("prop", &requests).unwrap();
        let plan = LockPlan::for_entry(&entry).unwrap();

        let net: Decimal = plan.movements().iter().map(|m| m.net_amount).sum();
        let postings: usize = plan.movements().iter().map(|m| m.posting_count).sum();

        prop_assert_eq!(net, Decimal::ZERO);
        prop_assert_eq!(postings, entry.postings.len());
        prop_assert!(plan.len() <= accounts.len());
    }

    // =========================================================================
    // Property 5: Amounts at the edge of the decimal range never panic
    // =========================================================================

    #[test]
    fn prop_near_max_amounts_are_accepted_or_rejected_cleanly(
        accounts in account_pool(),
        legs in prop::collection::vec(
            (0usize..8, near_max_amount(), prop_oneof![Just(1i8), Just(-1i8)]),
            2..6,
        ),
    ) {
        let requests: Vec<PostingRequest> = legs
            .iter()
            .map(|(idx, amount, direction)| {
                PostingRequest::new(
                    accounts[idx % accounts.len()].to_string(),
                    amount.to_string(),
                    *direction,
                )
            })
            .collect();

        for request in &requests {
            let parsed = parse_amount(&request.amount).unwrap();
            prop_assert_eq!(parsed.to_string(), request.amount.clone());
        }

        match validate_entry("edge", &requests) {
            Ok(entry) => {
                prop_assert_eq!(entry.net_amount(), Some(Decimal::ZERO));
                prop_assert!(LockPlan::for_entry(&entry).is_ok());
            }
            Err(ValidationError::AmountOverflow { index }) => {
                prop_assert!(index > 0 && index < requests.len());
            }
            Err(ValidationError::Unbalanced { imbalance }) => {
                prop_assert!(!imbalance.is_zero());
            }
            Err(other) => prop_assert!(false, "unexpected rejection: {}", other),
        }
    }
}
