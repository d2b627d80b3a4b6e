//! Posting validation: turns raw posting requests into a balanced journal entry.
//!
//! Validation happens before any I/O. The checks run in this order:
//! 1. At least 2 postings (before anything is parsed)
//! 2. Per posting: amount format, account reference, direction flag
//! 3. The signed running sum and every per-account net stay in range
//! 4. Signed postings sum to exactly zero

use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_shared::types::{AccountId, JournalEntryId, PostingId};

use super::error::ValidationError;
use super::lock_order::LockPlan;
use super::types::{Direction, EntryStatus, JournalEntry, Posting, PostingRequest};

/// Minimum number of postings in a journal entry.
pub const MIN_POSTINGS: usize = 2;

/// Parses a non-negative fixed-point decimal such as `"100"` or `"100.25"`.
///
/// Signs, exponents, digit separators, and surrounding whitespace are rejected,
/// as is any value the decimal type cannot hold without rounding.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (raw, None),
    };

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) {
        return None;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !digits_only(fraction) {
            return None;
        }
    }

    Decimal::from_str_exact(raw).ok()
}

/// Validates raw posting requests and builds an unpersisted journal entry.
///
/// # Errors
///
/// Returns the first `ValidationError` encountered.
pub fn validate_entry(
    description: &str,
    requests: &[PostingRequest],
) -> Result<JournalEntry, ValidationError> {
    if requests.len() < MIN_POSTINGS {
        return Err(ValidationError::InsufficientPostings {
            count: requests.len(),
        });
    }

    let entry_id = JournalEntryId::new();
    let mut postings = Vec::with_capacity(requests.len());

    for (index, request) in requests.iter().enumerate() {
        let amount = parse_amount(&request.amount).ok_or_else(|| {
            ValidationError::InvalidAmountFormat {
                index,
                value: request.amount.clone(),
            }
        })?;

        let account_id = AccountId::from_str(&request.account_id).map_err(|_| {
            ValidationError::InvalidAccountReference {
                index,
                value: request.account_id.clone(),
            }
        })?;

        let direction = Direction::try_from(request.direction)
            .map_err(|value| ValidationError::InvalidDirection { index, value })?;

        postings.push(Posting {
            id: PostingId::new(),
            journal_entry_id: entry_id,
            account_id,
            amount,
            direction,
        });
    }

    let mut imbalance = Decimal::ZERO;
    for (index, posting) in postings.iter().enumerate() {
        imbalance = imbalance
            .checked_add(posting.signed_amount())
            .ok_or(ValidationError::AmountOverflow { index })?;
    }
    LockPlan::from_postings(&postings)?;

    if !imbalance.is_zero() {
        return Err(ValidationError::Unbalanced { imbalance });
    }

    Ok(JournalEntry {
        id: entry_id,
        description: description.to_string(),
        status: EntryStatus::Posted,
        created_at: Utc::now(),
        postings,
    })
}
