//! Common types used across the application.

pub mod currency;
pub mod id;

pub use currency::{CurrencyCode, InvalidCurrencyCode};
pub use id::*;
