//! Ledger error types for validation, lookup, and commit failures.
//!
//! The set is closed: the retry controller and callers branch on variants,
//! never on message text.

use rust_decimal::Decimal;
use tally_shared::AppError;
use tally_shared::types::AccountId;
use thiserror::Error;

/// Structural problems with a proposed journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Fewer than two postings were supplied.
    #[error("insufficient postings: transaction must have at least 2 postings, got {count}")]
    InsufficientPostings {
        /// Number of postings supplied.
        count: usize,
    },

    /// A magnitude is not a non-negative fixed-point decimal.
    #[error("invalid amount format at posting {index}: {value:?}")]
    InvalidAmountFormat {
        /// Zero-based posting index.
        index: usize,
        /// The rejected input.
        value: String,
    },

    /// An account identifier is not a well-formed UUID.
    #[error("invalid account reference at posting {index}: {value:?}")]
    InvalidAccountReference {
        /// Zero-based posting index.
        index: usize,
        /// The rejected input.
        value: String,
    },

    /// A direction flag is neither +1 nor -1.
    #[error("invalid direction at posting {index}: {value} (expected 1 or -1)")]
    InvalidDirection {
        /// Zero-based posting index.
        index: usize,
        /// The rejected flag.
        value: i8,
    },

    /// The running signed sum leaves the decimal range.
    #[error("amount overflow at posting {index}: signed sum exceeds the decimal range")]
    AmountOverflow {
        /// Zero-based index of the posting whose addition overflowed.
        index: usize,
    },

    /// Signed postings do not sum to zero.
    #[error("transaction is not balanced: postings net to {imbalance}")]
    Unbalanced {
        /// Σ(magnitude × direction).
        imbalance: Decimal,
    },
}

/// Errors that can occur while posting to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or unbalanced input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Serialization failure, deadlock, or lock timeout in the store.
    #[error("Concurrent modification detected, please retry: {0}")]
    Concurrency(String),

    /// Any other storage failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Retries were exhausted on a concurrency conflict.
    #[error("Transaction failed after {attempts} attempts: {last}")]
    TransactionFailed {
        /// Attempts made, first try included.
        attempts: u32,
        /// The failure of the final attempt.
        last: Box<LedgerError>,
    },

    /// The caller's deadline elapsed during an attempt or backoff.
    #[error("Deadline exceeded after {attempts} attempts")]
    Timeout {
        /// Attempts started before the deadline hit.
        attempts: u32,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::InsufficientPostings { .. }) => {
                "INSUFFICIENT_POSTINGS"
            }
            Self::Validation(ValidationError::InvalidAmountFormat { .. }) => {
                "INVALID_AMOUNT_FORMAT"
            }
            Self::Validation(ValidationError::InvalidAccountReference { .. }) => {
                "INVALID_ACCOUNT_REFERENCE"
            }
            Self::Validation(ValidationError::InvalidDirection { .. }) => "INVALID_DIRECTION",
            Self::Validation(ValidationError::AmountOverflow { .. }) => "AMOUNT_OVERFLOW",
            Self::Validation(ValidationError::Unbalanced { .. }) => "UNBALANCED_TRANSACTION",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::Concurrency(_) => "CONCURRENT_MODIFICATION",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::TransactionFailed { .. } => "TRANSACTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::AccountNotFound(_) => 404,
            Self::Concurrency(_) | Self::TransactionFailed { .. } => 409,
            Self::Timeout { .. } => 504,
            Self::Persistence(_) => 500,
        }
    }

    /// Returns true if this error is transient contention worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Concurrency(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(inner) => Self::Validation(inner.to_string()),
            LedgerError::AccountNotFound(id) => Self::NotFound(format!("account {id}")),
            err @ (LedgerError::Concurrency(_) | LedgerError::TransactionFailed { .. }) => {
                Self::Conflict(err.to_string())
            }
            err @ LedgerError::Timeout { .. } => Self::Timeout(err.to_string()),
            LedgerError::Persistence(msg) => Self::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::from(ValidationError::InsufficientPostings { count: 1 }).error_code(),
            "INSUFFICIENT_POSTINGS"
        );
        assert_eq!(
            LedgerError::from(ValidationError::Unbalanced {
                imbalance: dec!(50)
            })
            .error_code(),
            "UNBALANCED_TRANSACTION"
        );
        assert_eq!(
            LedgerError::from(ValidationError::AmountOverflow { index: 1 }).error_code(),
            "AMOUNT_OVERFLOW"
        );
        assert_eq!(
            LedgerError::AccountNotFound(AccountId::new()).error_code(),
            "ACCOUNT_NOT_FOUND"
        );
        assert_eq!(
            LedgerError::Concurrency("40001".into()).error_code(),
            "CONCURRENT_MODIFICATION"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            LedgerError::from(ValidationError::InsufficientPostings { count: 0 })
                .http_status_code(),
            400
        );
        assert_eq!(
            LedgerError::AccountNotFound(AccountId::new()).http_status_code(),
            404
        );
        assert_eq!(
            LedgerError::TransactionFailed {
                attempts: 3,
                last: Box::new(LedgerError::Concurrency("deadlock".into())),
            }
            .http_status_code(),
            409
        );
        assert_eq!(LedgerError::Timeout { attempts: 1 }.http_status_code(), 504);
        assert_eq!(
            LedgerError::Persistence("disk full".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::Concurrency("serialization failure".into()).is_retryable());
        assert!(!LedgerError::Persistence("constraint".into()).is_retryable());
        assert!(!LedgerError::AccountNotFound(AccountId::new()).is_retryable());
        assert!(
            !LedgerError::from(ValidationError::Unbalanced {
                imbalance: dec!(1)
            })
            .is_retryable()
        );
        assert!(
            !LedgerError::TransactionFailed {
                attempts: 3,
                last: Box::new(LedgerError::Concurrency("deadlock".into())),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::from(ValidationError::Unbalanced {
            imbalance: dec!(-50.00),
        });
        assert_eq!(
            err.to_string(),
            "Validation error: transaction is not balanced: postings net to -50.00"
        );

        let err = LedgerError::TransactionFailed {
            attempts: 3,
            last: Box::new(LedgerError::Concurrency("deadlock detected".into())),
        };
        assert_eq!(
            err.to_string(),
            "Transaction failed after 3 attempts: Concurrent modification detected, please retry: deadlock detected"
        );
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = LedgerError::from(ValidationError::InsufficientPostings { count: 1 }).into();
        assert_eq!(app.status_code(), 400);

        let app: AppError = LedgerError::AccountNotFound(AccountId::new()).into();
        assert_eq!(app.error_code(), "NOT_FOUND");

        let app: AppError = LedgerError::TransactionFailed {
            attempts: 3,
            last: Box::new(LedgerError::Concurrency("deadlock".into())),
        }
        .into();
        assert_eq!(app.status_code(), 409);

        let app: AppError = LedgerError::Timeout { attempts: 2 }.into();
        assert_eq!(app.error_code(), "TIMEOUT");
    }
}
