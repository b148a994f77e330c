//! Read-only tabular views over books, authors, loans and members, and
//! their CSV export.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
	/// Every copy with every loan it ever had (one row when never lent).
	#[default]
	AllCopies,
	CurrentlyIssued,
	History,
}

const FULL_COLUMNS: &[&str] = &["serial_number", "title", "author", "user", "issue_date", "return_date"];

impl ReportKind {
	pub const ALL: [ReportKind; 3] = [ReportKind::AllCopies, ReportKind::CurrentlyIssued, ReportKind::History];

	pub fn columns(self) -> &'static [&'static str] {
		match self {
			ReportKind::CurrentlyIssued => &FULL_COLUMNS[..5],
			ReportKind::AllCopies | ReportKind::History => FULL_COLUMNS,
		}
	}

	pub fn title(self) -> &'static str {
		match self {
			ReportKind::AllCopies => "All books",
			ReportKind::CurrentlyIssued => "Issued books",
			ReportKind::History => "Transaction history",
		}
	}

	fn query(self) -> &'static str {
		match self {
			ReportKind::AllCopies => r#"
SELECT b.serial AS serial_number, b.title, a.name AS author,
	u.name AS "user", l.issue_date, l.return_date
FROM books b
LEFT JOIN authors a ON a.id = b.author_id
LEFT JOIN loans l ON l.book_id = b.id
LEFT JOIN users u ON u.id = l.user_id
ORDER BY b.title, b.id, l.issue_date, l.id"#,
			ReportKind::CurrentlyIssued => r#"
SELECT b.serial AS serial_number, b.title, a.name AS author,
	u.name AS "user", l.issue_date, l.return_date
FROM books b
JOIN authors a ON a.id = b.author_id
JOIN loans l ON l.book_id = b.id
JOIN users u ON u.id = l.user_id
WHERE l.return_date IS NULL
ORDER BY l.issue_date, l.id"#,
			ReportKind::History => r#"
SELECT b.serial AS serial_number, b.title, a.name AS author,
	u.name AS "user", l.issue_date, l.return_date
FROM books b
JOIN authors a ON a.id = b.author_id
JOIN loans l ON l.book_id = b.id
JOIN users u ON u.id = l.user_id
ORDER BY l.issue_date DESC, l.id DESC"#,
		}
	}
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ReportRow {
	pub serial_number: String,
	pub title: String,
	pub author: Option<String>,
	pub user: Option<String>,
	pub issue_date: Option<NaiveDate>,
	pub return_date: Option<NaiveDate>,
}

/// A currently-issued line has no return date column.
#[derive(Serialize)]
struct IssuedRecord<'a> {
	serial_number: &'a str,
	title: &'a str,
	author: Option<&'a str>,
	user: Option<&'a str>,
	issue_date: Option<NaiveDate>,
}

impl<'a> From<&'a ReportRow> for IssuedRecord<'a> {
	fn from(row: &'a ReportRow) -> Self {
		IssuedRecord {
			serial_number: &row.serial_number,
			title: &row.title,
			author: row.author.as_deref(),
			user: row.user.as_deref(),
			issue_date: row.issue_date,
		}
	}
}

impl ReportRow {
	// same order as FULL_COLUMNS
	fn cells(&self) -> [String; 6] {
		let text = |v: &Option<String>| v.clone().unwrap_or_default();
		let date = |v: &Option<NaiveDate>| v.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
		[
			self.serial_number.clone(),
			self.title.clone(),
			text(&self.author),
			text(&self.user),
			date(&self.issue_date),
			date(&self.return_date),
		]
	}
}

/// A materialized view; an empty `rows` is a valid, empty report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
	pub kind: ReportKind,
	pub rows: Vec<ReportRow>,
}

impl Report {
	pub fn columns(&self) -> &'static [&'static str] {
		self.kind.columns()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// Row cells projected onto this report's columns.
	pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
		let width = self.columns().len();
		self.rows.iter().map(move |row| {
			let mut cells = row.cells().to_vec();
			cells.truncate(width);
			cells
		})
	}

	pub fn write_csv<W: io::Write>(&self, out: W) -> Result<()> {
		if self.is_empty() {
			return Err(LedgerError::validation("no report data to export"));
		}
		// headers come from the serialized field names
		let mut writer = csv::Writer::from_writer(out);
		for row in &self.rows {
			match self.kind {
				ReportKind::CurrentlyIssued => writer.serialize(IssuedRecord::from(row))?,
				ReportKind::AllCopies | ReportKind::History => writer.serialize(row)?,
			}
		}
		writer.flush()?;
		Ok(())
	}

	/// Writes the report next to `path`, adding `.csv` when missing. Returns
	/// the path written.
	pub fn export(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
		let mut path = path.as_ref().to_path_buf();
		if path.extension().map_or(true, |ext| ext != "csv") {
			let mut name = path.as_os_str().to_owned();
			name.push(".csv");
			path = PathBuf::from(name);
		}
		if self.is_empty() {
			return Err(LedgerError::validation("no report data to export"));
		}
		self.write_csv(File::create(&path)?)?;
		info!(kind = ?self.kind, rows = self.rows.len(), path = %path.display(), "report exported");
		Ok(path)
	}
}

#[derive(Debug, Clone)]
pub struct Reports {
	db: SqlitePool,
}

impl Reports {
	pub fn new(db: SqlitePool) -> Self {
		Reports { db }
	}

	pub async fn generate(&self, kind: ReportKind) -> Result<Report> {
		let rows = sqlx::query_as::<_, ReportRow>(kind.query())
			.fetch_all(&self.db).await?;
		debug!(?kind, rows = rows.len(), "report generated");
		Ok(Report { kind, rows })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(serial: &str, returned: Option<NaiveDate>) -> ReportRow {
		ReportRow {
			serial_number: serial.to_string(),
			title: "1984".to_string(),
			author: Some("Orwell".to_string()),
			user: Some("Alice".to_string()),
			issue_date: NaiveDate::from_ymd_opt(2024, 1, 1),
			return_date: returned,
		}
	}

	#[test]
	fn issued_report_drops_return_column() {
		assert_eq!(ReportKind::CurrentlyIssued.columns().len(), 5);
		assert_eq!(ReportKind::History.columns().last(), Some(&"return_date"));
	}

	#[test]
	fn csv_header_matches_kind() {
		let report = Report { kind: ReportKind::CurrentlyIssued, rows: vec![row("S1", None)] };
		let mut out = Vec::new();
		report.write_csv(&mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		let mut lines = text.lines();
		assert_eq!(lines.next(), Some("serial_number,title,author,user,issue_date"));
		assert_eq!(lines.next(), Some("S1,1984,Orwell,Alice,2024-01-01"));
		assert_eq!(lines.next(), None);
	}

	#[test]
	fn absent_values_are_empty_cells() {
		let mut never_lent = row("S2", None);
		never_lent.user = None;
		never_lent.issue_date = None;
		let report = Report { kind: ReportKind::AllCopies, rows: vec![never_lent] };
		let mut out = Vec::new();
		report.write_csv(&mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text.lines().nth(1), Some("S2,1984,Orwell,,,"));
	}

	#[test]
	fn serialized_header_matches_columns() {
		for kind in ReportKind::ALL {
			let report = Report { kind, rows: vec![row("S1", NaiveDate::from_ymd_opt(2024, 1, 5))] };
			let mut out = Vec::new();
			report.write_csv(&mut out).unwrap();
			let text = String::from_utf8(out).unwrap();
			assert_eq!(text.lines().next(), Some(kind.columns().join(",").as_str()));
		}
	}

	#[test]
	fn empty_report_is_not_exported() {
		let report = Report { kind: ReportKind::History, rows: vec![] };
		assert!(matches!(report.write_csv(Vec::new()), Err(LedgerError::Validation(_))));
	}
}
