//! Authors and book copies.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{is_unique_violation_on, LedgerError, Result};
use crate::types::{
	fold, like_pattern, optional, required, Aid, Author, Bid, Book, BookOrder, BookRow, BookRowQuery,
	BookUpdate, Lookup, Page, PageRequest,
};

/// Catalogue rows joined to the open loan, if any. Callers append WHERE/ORDER.
pub(crate) const BOOK_ROWS: &str = r#"
SELECT b.id, b.serial, b.title, a.name AS author,
	u.name AS holder,
	COALESCE(u.address, b.location) AS location
FROM books b
JOIN authors a ON a.id = b.author_id
LEFT JOIN loans l ON l.book_id = b.id AND l.return_date IS NULL
LEFT JOIN users u ON u.id = l.user_id
"#;

pub(crate) async fn resolve_book(conn: &mut SqliteConnection, which: Lookup<'_>) -> Result<Bid> {
	let ids: Vec<Bid> = match which {
		Lookup::Serial(serial) => sqlx::query_scalar("SELECT id FROM books WHERE serial = ?")
			.bind(serial)
			.fetch_all(&mut *conn).await?,
		Lookup::Name(title) => sqlx::query_scalar("SELECT id FROM books WHERE title = ? LIMIT 2")
			.bind(title)
			.fetch_all(&mut *conn).await?,
	};
	match ids.as_slice() {
		[] => Err(LedgerError::NotFound(format!("book {which}"))),
		[id] => Ok(*id),
		_ => Err(LedgerError::Ambiguous(format!("more than one copy titled {which}, use the serial"))),
	}
}

pub(crate) async fn has_open_loan(conn: &mut SqliteConnection, book: Bid) -> Result<bool> {
	let open: Option<i64> = sqlx::query_scalar("SELECT id FROM loans WHERE book_id = ? AND return_date IS NULL")
		.bind(book)
		.fetch_optional(&mut *conn).await?;
	Ok(open.is_some())
}

#[derive(Debug, Clone)]
pub struct Catalog {
	db: SqlitePool,
}

impl Catalog {
	pub fn new(db: SqlitePool) -> Self {
		Catalog { db }
	}

	pub async fn create_author(&self, name: &str, details: Option<&str>) -> Result<Aid> {
		let name = required("author name", name)?;
		let id = sqlx::query("INSERT INTO authors (name, name_folded, details) VALUES (?, ?, ?)")
			.bind(&name)
			.bind(fold(&name))
			.bind(optional(details))
			.execute(&self.db).await
			.map_err(|e| {
				if is_unique_violation_on(&e, "authors.name") {
					LedgerError::DuplicateKey(format!("author {name:?} already exists"))
				} else {
					e.into()
				}
			})?
			.last_insert_rowid();
		info!(%id, %name, "author created");
		Ok(id)
	}

	pub async fn create_book(&self, serial: &str, title: &str, author_name: &str, location: Option<&str>) -> Result<Bid> {
		let serial = required("serial", serial)?;
		let title = required("title", title)?;
		let author_name = required("author", author_name)?;

		let mut tx = self.db.begin().await?;
		let author: Option<Aid> = sqlx::query_scalar("SELECT id FROM authors WHERE name = ?")
			.bind(&author_name)
			.fetch_optional(&mut *tx).await?;
		let author = author.ok_or_else(|| LedgerError::NotFound(format!("author {author_name:?}")))?;

		let id = sqlx::query(
			"INSERT INTO books (serial, title, title_folded, author_id, location) VALUES (?, ?, ?, ?, ?)"
		)
			.bind(&serial)
			.bind(&title)
			.bind(fold(&title))
			.bind(author)
			.bind(optional(location))
			.execute(&mut *tx).await
			.map_err(|e| duplicate_serial(e, &serial))?
			.last_insert_rowid();
		tx.commit().await?;

		info!(%id, %serial, "book created");
		Ok(id)
	}

	/// Renames or re-shelves a copy. The shelf may not move while the copy is out.
	pub async fn update_book(&self, old_serial: &str, update: BookUpdate) -> Result<()> {
		let serial = required("serial", &update.serial)?;
		let title = required("title", &update.title)?;
		let location = optional(update.location.as_deref());

		let mut tx = self.db.begin().await?;
		let current: Option<(Bid, Option<String>)> = sqlx::query_as("SELECT id, location FROM books WHERE serial = ?")
			.bind(old_serial)
			.fetch_optional(&mut *tx).await?;
		let (id, stored_location) = current
			.ok_or_else(|| LedgerError::NotFound(format!("book serial {old_serial:?}")))?;

		let taken: Option<Bid> = sqlx::query_scalar("SELECT id FROM books WHERE serial = ? AND id != ?")
			.bind(&serial)
			.bind(id)
			.fetch_optional(&mut *tx).await?;
		if taken.is_some() {
			return Err(LedgerError::DuplicateKey(format!("book serial {serial:?} already exists")));
		}

		if location != stored_location && has_open_loan(&mut *tx, id).await? {
			warn!(%id, serial = old_serial, "location change refused while issued");
			return Err(LedgerError::InvalidState(format!(
				"book {old_serial:?} is issued; location can only change while it is in the library"
			)));
		}

		sqlx::query("UPDATE books SET serial = ?, title = ?, title_folded = ?, location = ? WHERE id = ?")
			.bind(&serial)
			.bind(&title)
			.bind(fold(&title))
			.bind(&location)
			.bind(id)
			.execute(&mut *tx).await
			.map_err(|e| duplicate_serial(e, &serial))?;
		tx.commit().await?;

		info!(%id, %old_serial, %serial, "book updated");
		Ok(())
	}

	pub async fn book_by_serial(&self, serial: &str) -> Result<Book> {
		sqlx::query_as::<_, Book>("SELECT id, serial, title, author_id, location FROM books WHERE serial = ?")
			.bind(serial)
			.fetch_optional(&self.db).await?
			.ok_or_else(|| LedgerError::NotFound(format!("book serial {serial:?}")))
	}

	/// Case-insensitive substring search over title or author, with the
	/// derived holder on every row.
	pub async fn search_books(&self, term: &str, page: PageRequest, order: BookOrder) -> Result<Page<BookRow>> {
		let (limit, offset) = page.limit_offset()?;
		let term = term.trim();
		let pattern = like_pattern(term);
		let filter = "(?1 = '' OR b.title_folded LIKE ?2 ESCAPE '\\' OR a.name_folded LIKE ?2 ESCAPE '\\')";

		let total: i64 = sqlx::query_scalar(&format!(
			"SELECT COUNT(*) FROM books b JOIN authors a ON a.id = b.author_id WHERE {filter}"
		))
			.bind(term)
			.bind(&pattern)
			.fetch_one(&self.db).await?;
		let rows: Vec<BookRow> = sqlx::query_as::<_, BookRowQuery>(&format!(
			"{BOOK_ROWS} WHERE {filter} ORDER BY {}, b.id LIMIT ?3 OFFSET ?4",
			order.sql()
		))
			.bind(term)
			.bind(&pattern)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.db).await?
			.into_iter()
			.map(BookRow::from_query)
			.collect();

		debug!(term, total, page = page.page, "book search");
		Ok(Page { rows, total, page: page.page, size: page.size })
	}

	pub async fn list_authors(&self, term: Option<&str>, page: PageRequest) -> Result<Page<Author>> {
		let (limit, offset) = page.limit_offset()?;
		let term = term.map(str::trim).unwrap_or_default();
		let pattern = like_pattern(term);
		let filter = "(?1 = '' OR name_folded LIKE ?2 ESCAPE '\\')";

		let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM authors WHERE {filter}"))
			.bind(term)
			.bind(&pattern)
			.fetch_one(&self.db).await?;
		let rows = sqlx::query_as::<_, Author>(&format!(
			"SELECT id, name, details FROM authors WHERE {filter} ORDER BY name, id LIMIT ?3 OFFSET ?4"
		))
			.bind(term)
			.bind(&pattern)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.db).await?;

		Ok(Page { rows, total, page: page.page, size: page.size })
	}

	pub async fn author_names(&self) -> Result<Vec<String>> {
		Ok(sqlx::query_scalar("SELECT name FROM authors ORDER BY name")
			.fetch_all(&self.db).await?)
	}

	pub async fn book_titles(&self) -> Result<Vec<String>> {
		Ok(sqlx::query_scalar("SELECT DISTINCT title FROM books ORDER BY title")
			.fetch_all(&self.db).await?)
	}
}

fn duplicate_serial(err: sqlx::Error, serial: &str) -> LedgerError {
	if is_unique_violation_on(&err, "books.serial") {
		LedgerError::DuplicateKey(format!("book serial {serial:?} already exists"))
	} else {
		err.into()
	}
}
