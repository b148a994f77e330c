use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{LedgerError, Result};

pub type Aid = i64;
pub type Bid = i64;
pub type Uid = i64;
pub type Lid = i64;

/// Display value for a copy that sits on its shelf.
pub const LIBRARY: &str = "Library";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Author {
	pub id: Aid,
	pub name: String,
	pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Book {
	pub id: Bid,
	pub serial: String,
	pub title: String,
	pub author_id: Aid,
	pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookUpdate {
	pub serial: String,
	pub title: String,
	pub location: Option<String>,
}

/// A member as shown to callers; the credential never leaves the store.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Member {
	pub id: Uid,
	pub name: String,
	pub serial: String,
	pub dob: Option<NaiveDate>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
	pub name: String,
	pub serial: String,
	pub dob: Option<NaiveDate>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
	pub name: String,
	pub serial: String,
	pub dob: Option<NaiveDate>,
	pub phone: Option<String>,
	pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedUser {
	pub id: Uid,
	/// Set only when the ledger made the password up; shown once.
	pub generated_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Loan {
	pub id: Lid,
	pub user_id: Uid,
	pub book_id: Bid,
	pub issue_date: NaiveDate,
	pub return_date: Option<NaiveDate>,
}

impl Loan {
	pub fn is_open(&self) -> bool {
		self.return_date.is_none()
	}
}

/// Who has a copy right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Holder {
	Library,
	Member(String),
}

impl Holder {
	pub fn from_name(name: Option<String>) -> Self {
		match name {
			Some(name) => Holder::Member(name),
			None => Holder::Library,
		}
	}

	pub fn is_library(&self) -> bool {
		matches!(self, Holder::Library)
	}
}

impl fmt::Display for Holder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Holder::Library => f.write_str(LIBRARY),
			Holder::Member(name) => f.write_str(name),
		}
	}
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct BookRowQuery {
	pub id: Bid,
	pub serial: String,
	pub title: String,
	pub author: String,
	pub holder: Option<String>,
	pub location: Option<String>,
}

/// One line of the catalogue with its derived holder.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
	pub id: Bid,
	pub serial: String,
	pub title: String,
	pub author: String,
	pub holder: Holder,
	/// The holder's address when known, else the shelf location.
	pub location: Option<String>,
}

impl BookRow {
	pub(crate) fn from_query(q: BookRowQuery) -> Self {
		BookRow {
			id: q.id,
			serial: q.serial,
			title: q.title,
			author: q.author,
			holder: Holder::from_name(q.holder),
			location: q.location,
		}
	}
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OpenLoan {
	pub loan_id: Lid,
	pub serial: String,
	pub title: String,
	pub issue_date: NaiveDate,
}

/// How a state-changing call names a member or a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
	/// Unique key; always resolves to at most one row.
	Serial(&'a str),
	/// Member name or book title; more than one hit is an error.
	Name(&'a str),
}

impl fmt::Display for Lookup<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Lookup::Serial(s) => write!(f, "serial {s:?}"),
			Lookup::Name(s) => write!(f, "{s:?}"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookOrder {
	#[default]
	Title,
	Serial,
	Author,
}

impl BookOrder {
	pub(crate) fn sql(self) -> &'static str {
		match self {
			BookOrder::Title => "b.title",
			BookOrder::Serial => "b.serial",
			BookOrder::Author => "a.name",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	pub page: u32,
	pub size: u32,
}

impl PageRequest {
	pub fn new(page: u32, size: u32) -> Self {
		PageRequest { page, size }
	}

	// pages are 1-indexed
	pub(crate) fn limit_offset(&self) -> Result<(i64, i64)> {
		if self.page == 0 {
			return Err(LedgerError::validation("page numbers start at 1"));
		}
		if self.size == 0 {
			return Err(LedgerError::validation("page size must be positive"));
		}
		let size = i64::from(self.size);
		Ok((size, (i64::from(self.page) - 1) * size))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
	pub rows: Vec<T>,
	pub total: i64,
	pub page: u32,
	pub size: u32,
}

impl<T> Page<T> {
	pub fn page_count(&self) -> u32 {
		if self.total <= 0 {
			return 0;
		}
		let size = i64::from(self.size.max(1));
		u32::try_from((self.total + size - 1) / size).unwrap_or(u32::MAX)
	}

	pub fn is_last(&self) -> bool {
		self.page >= self.page_count()
	}
}

/// Trims a required field, rejecting blanks.
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
	let value = value.trim();
	if value.is_empty() {
		return Err(LedgerError::Validation(format!("{field} is required")));
	}
	Ok(value.to_string())
}

/// Blank optional text is stored as NULL.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Search key stored next to text that is matched case-insensitively.
/// SQLite's LIKE only folds ASCII, so both sides are lowercased up front.
pub(crate) fn fold(value: &str) -> String {
	value.to_lowercase()
}

/// `%term%` for LIKE against a folded column, with the wildcards in `term`
/// taken literally.
pub(crate) fn like_pattern(term: &str) -> String {
	let term = fold(term);
	let mut pattern = String::with_capacity(term.len() + 2);
	pattern.push('%');
	for c in term.chars() {
		if matches!(c, '%' | '_' | '\\') {
			pattern.push('\\');
		}
		pattern.push(c);
	}
	pattern.push('%');
	pattern
}
