//! Canonical lock ordering and per-account aggregation.
//!
//! Two entries touching the same accounts must lock them in the same order,
//! whatever order their postings were submitted in. Accounts are ordered by
//! their UUID bytes, which matches the lexicographic order of the lower-case
//! hyphenated string form. Each account is locked and written once per entry,
//! carrying the net of all postings that target it.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tally_shared::types::AccountId;

use super::error::ValidationError;
use super::types::{JournalEntry, Posting};

/// The aggregated movement applied to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountMovement {
    /// The account to lock and update.
    pub account_id: AccountId,
    /// Σ(magnitude × direction) over this account's postings.
    pub net_amount: Decimal,
    /// How many postings were folded into this movement.
    pub posting_count: usize,
}

/// Accounts touched by an entry, in the order their locks must be taken.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LockPlan {
    movements: Vec<AccountMovement>,
}

impl LockPlan {
    /// Builds the plan for a journal entry.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if an account's net leaves the decimal range.
    pub fn for_entry(entry: &JournalEntry) -> Result<Self, ValidationError> {
        Self::from_postings(&entry.postings)
    }

    /// Builds the plan from a set of postings.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` carrying the index of the posting whose
    /// addition took its account's net out of range.
    pub fn from_postings(postings: &[Posting]) -> Result<Self, ValidationError> {
        let mut by_account: BTreeMap<AccountId, (Decimal, usize)> = BTreeMap::new();
        for (index, posting) in postings.iter().enumerate() {
            let slot = by_account
                .entry(posting.account_id)
                .or_insert((Decimal::ZERO, 0));
            slot.0 = slot
                .0
                .checked_add(posting.signed_amount())
                .ok_or(ValidationError::AmountOverflow { index })?;
            slot.1 += 1;
        }

        let movements = by_account
            .into_iter()
            .map(|(account_id, (net_amount, posting_count))| AccountMovement {
                account_id,
                net_amount,
                posting_count,
            })
            .collect();

        Ok(Self { movements })
    }

    /// Movements in canonical lock order.
    #[must_use]
    pub fn movements(&self) -> &[AccountMovement] {
        &self.movements
    }

    /// Distinct account ids in canonical lock order.
    pub fn account_ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.movements.iter().map(|m| m.account_id)
    }

    /// Net movement for one account, if the entry touches it.
    #[must_use]
    pub fn net_movement(&self, account_id: AccountId) -> Option<Decimal> {
        self.movements
            .binary_search_by_key(&account_id, |m| m.account_id)
            .ok()
            .map(|idx| self.movements[idx].net_amount)
    }

    /// Number of distinct accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    /// Returns true if no account is touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}
