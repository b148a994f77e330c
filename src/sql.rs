use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::membership::hash_password;

pub const SEED_ADMIN_NAME: &str = "admin";
pub const SEED_ADMIN_SERIAL: &str = "0000";
pub const SEED_ADMIN_PASSWORD: &str = "admin";

pub const TABLE_SCHEMA: &[&str] = &[
	r#"
CREATE TABLE IF NOT EXISTS authors (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL UNIQUE,
	name_folded TEXT NOT NULL DEFAULT '',
	details TEXT
)"#,
	r#"
CREATE TABLE IF NOT EXISTS books (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	serial TEXT NOT NULL UNIQUE,
	title TEXT NOT NULL,
	title_folded TEXT NOT NULL DEFAULT '',
	author_id INTEGER NOT NULL,
	location TEXT,
	FOREIGN KEY(author_id) REFERENCES authors(id)
)"#,
	r#"
CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL,
	serial TEXT NOT NULL UNIQUE,
	name_folded TEXT NOT NULL DEFAULT '',
	serial_folded TEXT NOT NULL DEFAULT '',
	dob DATE,
	phone TEXT,
	address TEXT,
	password TEXT NOT NULL,
	is_admin BOOLEAN NOT NULL DEFAULT false
)"#,
	r#"
CREATE TABLE IF NOT EXISTS loans (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL,
	book_id INTEGER NOT NULL,
	issue_date DATE NOT NULL,
	return_date DATE,
	CHECK(return_date IS NULL OR return_date >= issue_date),
	FOREIGN KEY(user_id) REFERENCES users(id),
	FOREIGN KEY(book_id) REFERENCES books(id)
)"#,
	// a copy can be out to one member at a time
	r#"
CREATE UNIQUE INDEX IF NOT EXISTS loans_one_open_per_book
	ON loans(book_id) WHERE return_date IS NULL"#,
	"CREATE INDEX IF NOT EXISTS loans_by_user ON loans(user_id, return_date)",
	"CREATE INDEX IF NOT EXISTS books_by_author ON books(author_id)",
];

pub async fn connect(config: &Config) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(&config.database_url)?
		.create_if_missing(true)
		.foreign_keys(true)
		.busy_timeout(config.busy_timeout);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(config.acquire_timeout)
		.connect_with(options).await?;
	info!(url = %config.database_url, "connected to store");
	Ok(pool)
}

/// Private in-memory store. One connection that never expires, or the
/// database would vanish with it.
pub async fn connect_memory() -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.acquire_timeout(Duration::from_secs(3))
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options).await?;
	Ok(pool)
}

/// Creates the tables when absent and seeds the admin account once.
/// Safe to run on every start.
pub async fn provision(db: &SqlitePool, bcrypt_cost: u32) -> Result<()> {
	let mut tx = db.begin().await?;
	for statement in TABLE_SCHEMA {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	let seeded: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE serial = ?")
		.bind(SEED_ADMIN_SERIAL)
		.fetch_optional(db).await?;
	if seeded.is_some() {
		debug!("seed admin already present");
		return Ok(());
	}

	let hash = hash_password(SEED_ADMIN_PASSWORD, bcrypt_cost).await?;
	let inserted = sqlx::query(
		"INSERT OR IGNORE INTO users (name, serial, name_folded, serial_folded, password, is_admin) \
		 VALUES (?1, ?2, ?1, ?2, ?3, true)"
	)
		.bind(SEED_ADMIN_NAME)
		.bind(SEED_ADMIN_SERIAL)
		.bind(hash)
		.execute(db).await?
		.rows_affected();
	if inserted > 0 {
		info!("seeded admin account");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn provisioning_twice_keeps_one_admin() {
		let db = connect_memory().await.unwrap();
		provision(&db, 4).await.unwrap();
		provision(&db, 4).await.unwrap();

		let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE serial = '0000' AND is_admin")
			.fetch_one(&db).await.unwrap();
		assert_eq!(admins, 1);
	}

	#[tokio::test]
	async fn store_rejects_second_open_loan() {
		let db = connect_memory().await.unwrap();
		provision(&db, 4).await.unwrap();
		sqlx::query("INSERT INTO authors (name) VALUES ('Orwell')").execute(&db).await.unwrap();
		sqlx::query("INSERT INTO books (serial, title, author_id) VALUES ('S1', '1984', 1)")
			.execute(&db).await.unwrap();

		let open = "INSERT INTO loans (user_id, book_id, issue_date) VALUES (1, 1, '2024-01-01')";
		sqlx::query(open).execute(&db).await.unwrap();
		let err = sqlx::query(open).execute(&db).await.unwrap_err();
		assert!(crate::error::is_unique_violation_on(&err, "loans.book_id"));
	}

	#[tokio::test]
	async fn store_rejects_return_before_issue() {
		let db = connect_memory().await.unwrap();
		provision(&db, 4).await.unwrap();
		sqlx::query("INSERT INTO authors (name) VALUES ('Orwell')").execute(&db).await.unwrap();
		sqlx::query("INSERT INTO books (serial, title, author_id) VALUES ('S1', '1984', 1)")
			.execute(&db).await.unwrap();

		let res = sqlx::query(
			"INSERT INTO loans (user_id, book_id, issue_date, return_date) VALUES (1, 1, '2024-01-10', '2024-01-01')"
		).execute(&db).await;
		assert!(res.is_err());
	}
}
