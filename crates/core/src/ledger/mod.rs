//! Double-entry posting engine.
//!
//! This module implements the write path of the ledger:
//! - Domain types (accounts, journal entries, postings)
//! - Validation of raw posting requests
//! - Canonical lock ordering with per-account aggregation
//! - The repository capability and an in-memory implementation
//! - Retry with exponential backoff for contended commits
//! - Cache invalidation after commit
//! - The `LedgerService` facade tying it together

pub mod cache;
pub mod error;
pub mod lock_order;
pub mod memory;
pub mod repository;
pub mod retry;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use cache::{
    CacheError, CacheInvalidator, CacheKey, CacheStore, InvalidationReport, MokaCacheStore,
    TouchedAccount,
};
pub use error::{LedgerError, ValidationError};
pub use lock_order::{AccountMovement, LockPlan};
pub use memory::InMemoryLedgerRepository;
pub use repository::LedgerRepository;
pub use retry::{RetryError, RetryPolicy, retry};
pub use service::LedgerService;
pub use types::{
    Account, AccountType, Direction, EntryStatus, JournalEntry, NewAccount, Posting,
    PostingRequest,
};
pub use validation::{MIN_POSTINGS, parse_amount, validate_entry};
