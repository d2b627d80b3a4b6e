//! Translation of database errors into ledger errors.
//!
//! Classification is by SQLSTATE only. Lock contention becomes
//! [`LedgerError::Concurrency`] so the retry controller can try again;
//! everything else becomes [`LedgerError::Persistence`].

use sea_orm::{DbErr, RuntimeErr};
use tally_core::ledger::LedgerError;

/// `serialization_failure`
pub const SERIALIZATION_FAILURE: &str = "40001";
/// `deadlock_detected`
pub const DEADLOCK_DETECTED: &str = "40P01";
/// `lock_not_available`, raised when `lock_timeout` expires.
pub const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Returns true if `code` denotes transient lock contention.
#[must_use]
pub fn is_contention(code: &str) -> bool {
    matches!(
        code,
        SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
    )
}

/// Extracts the SQLSTATE reported by PostgreSQL, if any.
#[must_use]
pub fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) => {
            db_err.code().map(std::borrow::Cow::into_owned)
        }
        _ => None,
    }
}

/// Maps a database error onto the ledger error taxonomy.
#[must_use]
pub fn classify(err: DbErr) -> LedgerError {
    match sqlstate(&err) {
        Some(code) if is_contention(&code) => {
            tracing::debug!(sqlstate = %code, error = %err, "lock contention");
            LedgerError::Concurrency(format!("{err} (SQLSTATE {code})"))
        }
        _ => LedgerError::Persistence(err.to_string()),
    }
}
