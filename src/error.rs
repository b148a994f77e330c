//! Error taxonomy shared by every ledger operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Everything a ledger call can fail with. A failed mutating call leaves the
/// store exactly as it was before the call.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// A required field is missing or malformed.
	#[error("invalid input: {0}")]
	Validation(String),

	/// A serial number or author name is already taken.
	#[error("duplicate key: {0}")]
	DuplicateKey(String),

	#[error("not found: {0}")]
	NotFound(String),

	/// The state machine refused the transition (double issue, location edit
	/// while issued, ...).
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// A name lookup matched more than one row; use the serial number.
	#[error("ambiguous: {0}")]
	Ambiguous(String),

	#[error("authentication failed")]
	AuthFailed,

	/// Hashing or verifying a password failed.
	#[error("credential error: {0}")]
	Credential(String),

	#[error("store timed out")]
	Timeout,

	#[error("store unavailable: {0}")]
	StoreUnavailable(String),

	#[error("export failed: {0}")]
	Export(String),
}

impl LedgerError {
	pub fn validation(msg: impl Into<String>) -> Self {
		LedgerError::Validation(msg.into())
	}
}

// sqlite primary result codes
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

// extended codes carry the primary code in the low byte
fn primary_code(code: &str) -> Option<i32> {
	code.parse::<i32>().ok().map(|c| c & 0xff)
}

/// True when `err` is a unique-constraint failure on the given `table.column`.
pub(crate) fn is_unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
	match err {
		sqlx::Error::Database(db) => db.is_unique_violation() && db.message().contains(column),
		_ => false,
	}
}

impl From<sqlx::Error> for LedgerError {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::RowNotFound => LedgerError::NotFound("row not found".to_string()),
			sqlx::Error::PoolTimedOut => LedgerError::Timeout,
			sqlx::Error::Database(db) => {
				if db.is_unique_violation() {
					return LedgerError::DuplicateKey(db.message().to_string());
				}
				match db.code().as_deref().and_then(primary_code) {
					Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => LedgerError::Timeout,
					_ => LedgerError::StoreUnavailable(db.message().to_string()),
				}
			},
			other => LedgerError::StoreUnavailable(other.to_string()),
		}
	}
}

impl From<csv::Error> for LedgerError {
	fn from(err: csv::Error) -> Self {
		LedgerError::Export(err.to_string())
	}
}

impl From<std::io::Error> for LedgerError {
	fn from(err: std::io::Error) -> Self {
		LedgerError::Export(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_timeout_maps_to_timeout() {
		assert!(matches!(LedgerError::from(sqlx::Error::PoolTimedOut), LedgerError::Timeout));
	}

	#[test]
	fn closed_pool_is_unavailable() {
		assert!(matches!(
			LedgerError::from(sqlx::Error::PoolClosed),
			LedgerError::StoreUnavailable(_)
		));
	}

	#[test]
	fn extended_busy_codes_reduce_to_busy() {
		assert_eq!(primary_code("5"), Some(SQLITE_BUSY));
		assert_eq!(primary_code("517"), Some(SQLITE_BUSY));
		assert_eq!(primary_code("262"), Some(SQLITE_LOCKED));
		assert_eq!(primary_code("x"), None);
	}

	#[test]
	fn messages_are_user_facing() {
		let err = LedgerError::InvalidState("book S1 is already issued".into());
		assert_eq!(err.to_string(), "invalid state: book S1 is already issued");
	}
}
