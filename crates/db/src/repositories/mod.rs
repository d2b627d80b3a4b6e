//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod account;
pub mod error;
pub mod journal;
pub mod ledger;

pub use account::AccountRepository;
pub use error::{classify, is_contention, sqlstate};
pub use journal::JournalRepository;
pub use ledger::PostgresLedgerRepository;
