//! Ledger domain types for posting money movements.
//!
//! This module defines the accounts, journal entries, and postings the
//! posting engine works with, plus the raw request shape callers submit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CurrencyCode, JournalEntryId, PostingId, UserId};

/// Account category. Every category held by this ledger is asset-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Checking (current) account.
    Checking,
    /// Savings account.
    Savings,
    /// Cash on hand or settlement cash.
    Cash,
    /// Investment account.
    Investment,
}

impl AccountType {
    /// Returns the lower-case name used in storage and transport.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Cash => "cash",
            Self::Investment => "investment",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "cash" => Ok(Self::Cash),
            "investment" => Ok(Self::Investment),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// Direction of a posting.
///
/// A debit adds to the account balance, a credit subtracts from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    /// +1: money moves into the account.
    Debit,
    /// -1: money moves out of the account.
    Credit,
}

impl Direction {
    /// Returns the direction flag (+1 or -1).
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Debit => 1,
            Self::Credit => -1,
        }
    }

    /// Applies the direction to an unsigned magnitude.
    #[must_use]
    pub fn apply(self, magnitude: Decimal) -> Decimal {
        match self {
            Self::Debit => magnitude,
            Self::Credit => -magnitude,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = i8;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Debit),
            -1 => Ok(Self::Credit),
            other => Err(other),
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        direction.as_i8()
    }
}

/// Lifecycle status of a journal entry.
///
/// Entries are created already posted; there are no draft or reversal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry has been committed to the ledger (immutable).
    #[default]
    Posted,
}

/// A ledger account with its cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub id: AccountId,
    /// The user owning this account.
    pub user_id: UserId,
    /// Human-readable label.
    pub name: String,
    /// Account category.
    pub account_type: AccountType,
    /// Currency the balance is denominated in.
    pub currency: CurrencyCode,
    /// Cached balance, maintained by the committer.
    pub balance: Decimal,
    /// Incremented once per committed entry touching this account.
    pub balance_version: i64,
    /// When the account was opened.
    pub created_at: DateTime<Utc>,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Builds a freshly opened account with zero balance and version.
    #[must_use]
    pub fn open(input: NewAccount) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            user_id: input.user_id,
            name: input.name,
            account_type: input.account_type,
            currency: input.currency,
            balance: Decimal::ZERO,
            balance_version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for opening an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// The owning user.
    pub user_id: UserId,
    /// Human-readable label.
    pub name: String,
    /// Account category.
    pub account_type: AccountType,
    /// Currency code.
    pub currency: CurrencyCode,
}

/// A single signed movement of money against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// The posting ID.
    pub id: PostingId,
    /// The journal entry this posting belongs to.
    pub journal_entry_id: JournalEntryId,
    /// The account being moved.
    pub account_id: AccountId,
    /// Unsigned magnitude.
    pub amount: Decimal,
    /// Whether the magnitude is added or subtracted.
    pub direction: Direction,
}

impl Posting {
    /// Returns `amount × direction`.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.direction.apply(self.amount)
    }
}

/// An atomic, immutable group of postings representing one financial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The entry ID.
    pub id: JournalEntryId,
    /// Free-text description.
    pub description: String,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Postings in submission order.
    pub postings: Vec<Posting>,
}

impl JournalEntry {
    /// Returns the sum of all signed posting amounts, or `None` on overflow.
    ///
    /// `Some(0)` for every entry that passed validation.
    #[must_use]
    pub fn net_amount(&self) -> Option<Decimal> {
        self.postings
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.signed_amount()))
    }
}

/// A posting as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    /// Account identifier in UUID string form.
    pub account_id: String,
    /// Decimal-formatted magnitude, e.g. "100.00".
    pub amount: String,
    /// +1 (debit) or -1 (credit).
    pub direction: i8,
}

impl PostingRequest {
    /// Convenience constructor.
    pub fn new(account_id: impl Into<String>, amount: impl Into<String>, direction: i8) -> Self {
        Self {
            account_id: account_id.into(),
            amount: amount.into(),
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_direction_from_flag() {
        assert_eq!(Direction::try_from(1), Ok(Direction::Debit));
        assert_eq!(Direction::try_from(-1), Ok(Direction::Credit));
        assert_eq!(Direction::try_from(0), Err(0));
        assert_eq!(Direction::try_from(2), Err(2));
    }

    #[test]
    fn test_direction_apply() {
        assert_eq!(Direction::Debit.apply(dec!(10.50)), dec!(10.50));
        assert_eq!(Direction::Credit.apply(dec!(10.50)), dec!(-10.50));
    }

    #[test]
    fn test_direction_serializes_as_flag() {
        assert_eq!(serde_json::to_string(&Direction::Credit).unwrap(), "-1");
        assert_eq!(
            serde_json::from_str::<Direction>("1").unwrap(),
            Direction::Debit
        );
        assert!(serde_json::from_str::<Direction>("3").is_err());
    }

    #[test]
    fn test_account_type_round_trip() {
        for account_type in [
            AccountType::Checking,
            AccountType::Savings,
            AccountType::Cash,
            AccountType::Investment,
        ] {
            assert_eq!(
                AccountType::from_str(account_type.as_str()).unwrap(),
                account_type
            );
        }
        assert!(AccountType::from_str("liability").is_err());
    }

    #[test]
    fn test_open_account_starts_at_zero() {
        let account = Account::open(NewAccount {
            user_id: UserId::new(),
            name: "Main".to_string(),
            account_type: AccountType::Checking,
            currency: CurrencyCode::parse("USD").unwrap(),
        });
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.balance_version, 0);
    }

    #[test]
    fn test_posting_request_deserializes() {
        let request: PostingRequest = serde_json::from_str(
            r#"{"account_id":"0190c9c4-1d2e-7b3a-9f00-000000000001","amount":"100.00","direction":-1}"#,
        )
        .unwrap();
        assert_eq!(request.amount, "100.00");
        assert_eq!(request.direction, -1);
    }
}
