//! Issue/return state machine. A copy is either in the library or out on
//! exactly one open loan; the partial unique index `loans_one_open_per_book`
//! backs the check below against racing writers.

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use tracing::{info, warn};

use crate::catalog::{has_open_loan, resolve_book, BOOK_ROWS};
use crate::error::{is_unique_violation_on, LedgerError, Result};
use crate::membership::resolve_user;
use crate::types::{BookRow, BookRowQuery, Holder, Lid, Loan, Lookup, OpenLoan};

#[derive(Debug, Clone)]
pub struct Circulation {
	db: SqlitePool,
}

impl Circulation {
	pub fn new(db: SqlitePool) -> Self {
		Circulation { db }
	}

	pub async fn issue_book(&self, user: Lookup<'_>, book: Lookup<'_>, issue_date: NaiveDate) -> Result<Lid> {
		let mut tx = self.db.begin().await?;
		let user_id = resolve_user(&mut *tx, user).await?;
		let book_id = resolve_book(&mut *tx, book).await?;

		if has_open_loan(&mut *tx, book_id).await? {
			warn!(%book_id, "issue refused, already out");
			return Err(already_issued(book));
		}

		let loan = sqlx::query("INSERT INTO loans (user_id, book_id, issue_date) VALUES (?, ?, ?)")
			.bind(user_id)
			.bind(book_id)
			.bind(issue_date)
			.execute(&mut *tx).await
			.map_err(|e| {
				// another writer got there between our check and insert
				if is_unique_violation_on(&e, "loans.book_id") {
					warn!(%book_id, "issue lost race");
					already_issued(book)
				} else {
					e.into()
				}
			})?
			.last_insert_rowid();
		tx.commit().await?;

		info!(%loan, %user_id, %book_id, %issue_date, "book issued");
		Ok(loan)
	}

	/// Closes the open loan of this exact member/copy pair.
	pub async fn return_book(&self, user: Lookup<'_>, book: Lookup<'_>, return_date: NaiveDate) -> Result<()> {
		let mut tx = self.db.begin().await?;
		let user_id = resolve_user(&mut *tx, user).await?;
		let book_id = resolve_book(&mut *tx, book).await?;

		let open: Option<(Lid, NaiveDate)> = sqlx::query_as(
			"SELECT id, issue_date FROM loans WHERE user_id = ? AND book_id = ? AND return_date IS NULL"
		)
			.bind(user_id)
			.bind(book_id)
			.fetch_optional(&mut *tx).await?;
		let Some((loan, issue_date)) = open else {
			warn!(%user_id, %book_id, "return refused, no active loan");
			return Err(LedgerError::NotFound(format!("no active loan of {book} to {user}")));
		};
		if return_date < issue_date {
			return Err(LedgerError::Validation(format!(
				"return date {return_date} is before issue date {issue_date}"
			)));
		}

		let closed = sqlx::query("UPDATE loans SET return_date = ? WHERE id = ? AND return_date IS NULL")
			.bind(return_date)
			.bind(loan)
			.execute(&mut *tx).await?
			.rows_affected();
		if closed == 0 {
			warn!(%loan, "return refused, loan already closed");
			return Err(LedgerError::InvalidState(format!("loan of {book} to {user} is already closed")));
		}
		tx.commit().await?;

		info!(%loan, %user_id, %book_id, %return_date, "book returned");
		Ok(())
	}

	/// Copies with no open loan, ordered by title.
	pub async fn available_books(&self) -> Result<Vec<BookRow>> {
		let rows = sqlx::query_as::<_, BookRowQuery>(&format!(
			"{BOOK_ROWS} WHERE l.id IS NULL ORDER BY b.title, b.id"
		))
			.fetch_all(&self.db).await?;
		Ok(rows.into_iter().map(BookRow::from_query).collect())
	}

	/// Copies currently out to one member; the candidates for a return.
	pub async fn open_loans_for(&self, user: Lookup<'_>) -> Result<Vec<OpenLoan>> {
		let mut conn = self.db.acquire().await?;
		let user_id = resolve_user(&mut *conn, user).await?;
		Ok(sqlx::query_as::<_, OpenLoan>(
			r#"
SELECT l.id AS loan_id, b.serial, b.title, l.issue_date
FROM loans l
JOIN books b ON b.id = l.book_id
WHERE l.user_id = ? AND l.return_date IS NULL
ORDER BY l.issue_date, l.id"#
		)
			.bind(user_id)
			.fetch_all(&mut *conn).await?)
	}

	pub async fn holder_of(&self, book: Lookup<'_>) -> Result<Holder> {
		let mut conn = self.db.acquire().await?;
		let book_id = resolve_book(&mut *conn, book).await?;
		let name: Option<String> = sqlx::query_scalar(
			r#"
SELECT u.name FROM loans l JOIN users u ON u.id = l.user_id
WHERE l.book_id = ? AND l.return_date IS NULL"#
		)
			.bind(book_id)
			.fetch_optional(&mut *conn).await?;
		Ok(Holder::from_name(name))
	}

	/// Every loan of one copy, newest first.
	pub async fn loans_for_book(&self, serial: &str) -> Result<Vec<Loan>> {
		let mut conn = self.db.acquire().await?;
		let book_id = resolve_book(&mut *conn, Lookup::Serial(serial)).await?;
		Ok(sqlx::query_as::<_, Loan>(
			"SELECT id, user_id, book_id, issue_date, return_date FROM loans WHERE book_id = ? ORDER BY issue_date DESC, id DESC"
		)
			.bind(book_id)
			.fetch_all(&mut *conn).await?)
	}
}

fn already_issued(book: Lookup<'_>) -> LedgerError {
	LedgerError::InvalidState(format!("book {book} is already issued"))
}
