//! Core posting engine for Tally.
//!
//! This crate contains the ledger's business logic with ZERO web or database
//! dependencies. Storage and caching are reached through capability traits
//! (`LedgerRepository`, `CacheStore`) so the engine runs the same against
//! PostgreSQL or process memory.
//!
//! # Modules
//!
//! - `ledger` - Validation, lock ordering, retry, cache invalidation, service

pub mod ledger;
