//! `SeaORM` entity definitions for the ledger schema.

#![allow(missing_docs)]

pub mod accounts;
pub mod journal_entries;
pub mod postings;
pub mod sea_orm_active_enums;
