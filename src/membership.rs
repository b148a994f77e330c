//! Members: cards, credentials and the admin flag.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::FromRow;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{is_unique_violation_on, LedgerError, Result};
use crate::types::{
	fold, like_pattern, optional, required, CreatedUser, Lookup, Member, NewUser, Page, PageRequest, Uid,
	UserUpdate,
};

const MEMBER_COLUMNS: &str = "id, name, serial, dob, phone, address, is_admin";

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
	let password = password.to_string();
	tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
		.await
		.map_err(|e| LedgerError::Credential(format!("hash task failed: {e}")))?
		.map_err(|e| LedgerError::Credential(e.to_string()))
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
	let password = password.to_string();
	let hash = hash.to_string();
	tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
		.await
		.map_err(|e| LedgerError::Credential(format!("verify task failed: {e}")))?
		.map_err(|e| LedgerError::Credential(e.to_string()))
}

/// Opaque first password for members created without one.
pub fn generate_password() -> String {
	Uuid::new_v4().simple().to_string()
}

pub(crate) async fn resolve_user(conn: &mut SqliteConnection, who: Lookup<'_>) -> Result<Uid> {
	let ids: Vec<Uid> = match who {
		Lookup::Serial(serial) => sqlx::query_scalar("SELECT id FROM users WHERE serial = ?")
			.bind(serial)
			.fetch_all(&mut *conn).await?,
		Lookup::Name(name) => sqlx::query_scalar("SELECT id FROM users WHERE name = ? LIMIT 2")
			.bind(name)
			.fetch_all(&mut *conn).await?,
	};
	match ids.as_slice() {
		[] => Err(LedgerError::NotFound(format!("member {who}"))),
		[id] => Ok(*id),
		_ => Err(LedgerError::Ambiguous(format!("more than one member named {who}, use the card serial"))),
	}
}

#[derive(FromRow)]
struct Credential {
	#[sqlx(flatten)]
	member: Member,
	password: String,
}

#[derive(Debug, Clone)]
pub struct Membership {
	db: SqlitePool,
	bcrypt_cost: u32,
}

impl Membership {
	pub fn new(db: SqlitePool, bcrypt_cost: u32) -> Self {
		Membership { db, bcrypt_cost }
	}

	pub async fn create_user(&self, new: NewUser) -> Result<CreatedUser> {
		let name = required("name", &new.name)?;
		let serial = required("serial", &new.serial)?;
		let (password, generated_password) = match new.password.filter(|p| !p.is_empty()) {
			Some(password) => (password, None),
			None => {
				let password = generate_password();
				(password.clone(), Some(password))
			},
		};
		let hash = hash_password(&password, self.bcrypt_cost).await?;

		let id = sqlx::query(
			"INSERT INTO users (name, serial, name_folded, serial_folded, dob, phone, address, password) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
		)
			.bind(&name)
			.bind(&serial)
			.bind(fold(&name))
			.bind(fold(&serial))
			.bind(new.dob)
			.bind(optional(new.phone.as_deref()))
			.bind(optional(new.address.as_deref()))
			.bind(hash)
			.execute(&self.db).await
			.map_err(|e| duplicate_serial(e, &serial))?
			.last_insert_rowid();

		info!(%id, %serial, "member created");
		Ok(CreatedUser { id, generated_password })
	}

	pub async fn update_user(&self, old_serial: &str, update: UserUpdate) -> Result<()> {
		let name = required("name", &update.name)?;
		let serial = required("serial", &update.serial)?;

		let mut tx = self.db.begin().await?;
		let id = resolve_user(&mut *tx, Lookup::Serial(old_serial)).await?;
		let taken: Option<Uid> = sqlx::query_scalar("SELECT id FROM users WHERE serial = ? AND id != ?")
			.bind(&serial)
			.bind(id)
			.fetch_optional(&mut *tx).await?;
		if taken.is_some() {
			return Err(LedgerError::DuplicateKey(format!("member serial {serial:?} already exists")));
		}

		sqlx::query(
			"UPDATE users SET name = ?, serial = ?, name_folded = ?, serial_folded = ?, \
			 dob = ?, phone = ?, address = ? WHERE id = ?"
		)
			.bind(&name)
			.bind(&serial)
			.bind(fold(&name))
			.bind(fold(&serial))
			.bind(update.dob)
			.bind(optional(update.phone.as_deref()))
			.bind(optional(update.address.as_deref()))
			.bind(id)
			.execute(&mut *tx).await
			.map_err(|e| duplicate_serial(e, &serial))?;
		tx.commit().await?;

		info!(%id, %old_serial, %serial, "member updated");
		Ok(())
	}

	pub async fn user_by_serial(&self, serial: &str) -> Result<Member> {
		sqlx::query_as::<_, Member>(&format!("SELECT {MEMBER_COLUMNS} FROM users WHERE serial = ?"))
			.bind(serial)
			.fetch_optional(&self.db).await?
			.ok_or_else(|| LedgerError::NotFound(format!("member serial {serial:?}")))
	}

	/// Substring match on name or card serial, ordered by name.
	pub async fn search_users(&self, term: &str, page: PageRequest) -> Result<Page<Member>> {
		let (limit, offset) = page.limit_offset()?;
		let term = term.trim();
		let pattern = like_pattern(term);
		let filter = "(?1 = '' OR name_folded LIKE ?2 ESCAPE '\\' OR serial_folded LIKE ?2 ESCAPE '\\')";

		let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
			.bind(term)
			.bind(&pattern)
			.fetch_one(&self.db).await?;
		let rows = sqlx::query_as::<_, Member>(&format!(
			"SELECT {MEMBER_COLUMNS} FROM users WHERE {filter} ORDER BY name, id LIMIT ?3 OFFSET ?4"
		))
			.bind(term)
			.bind(&pattern)
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.db).await?;

		debug!(term, total, page = page.page, "member search");
		Ok(Page { rows, total, page: page.page, size: page.size })
	}

	/// Checks `password` against every member called `name`.
	pub async fn authenticate(&self, name: &str, password: &str) -> Result<Member> {
		let candidates = sqlx::query_as::<_, Credential>(&format!(
			"SELECT {MEMBER_COLUMNS}, password FROM users WHERE name = ?"
		))
			.bind(name.trim())
			.fetch_all(&self.db).await?;

		let mut matched = Vec::new();
		for candidate in candidates {
			if verify_password(password, &candidate.password).await? {
				matched.push(candidate.member);
			}
		}
		match matched.len() {
			0 => {
				warn!(name, "authentication failed");
				Err(LedgerError::AuthFailed)
			},
			1 => {
				let member = matched.remove(0);
				info!(id = member.id, "authenticated");
				Ok(member)
			},
			_ => Err(LedgerError::Ambiguous(format!("more than one member named {name:?} matches"))),
		}
	}

	/// Makes the member an admin and replaces their password. There is no revoke.
	pub async fn grant_admin(&self, user_serial: &str, new_password: &str) -> Result<()> {
		if new_password.is_empty() {
			return Err(LedgerError::validation("password is required"));
		}
		let hash = hash_password(new_password, self.bcrypt_cost).await?;
		let updated = sqlx::query("UPDATE users SET is_admin = true, password = ? WHERE serial = ?")
			.bind(hash)
			.bind(user_serial)
			.execute(&self.db).await?
			.rows_affected();
		if updated == 0 {
			return Err(LedgerError::NotFound(format!("member serial {user_serial:?}")));
		}
		info!(serial = user_serial, "admin granted");
		Ok(())
	}

	pub async fn user_names(&self) -> Result<Vec<String>> {
		Ok(sqlx::query_scalar("SELECT DISTINCT name FROM users ORDER BY name")
			.fetch_all(&self.db).await?)
	}

	pub async fn non_admin_users(&self) -> Result<Vec<Member>> {
		Ok(sqlx::query_as::<_, Member>(&format!(
			"SELECT {MEMBER_COLUMNS} FROM users WHERE NOT is_admin ORDER BY name, id"
		))
			.fetch_all(&self.db).await?)
	}
}

fn duplicate_serial(err: sqlx::Error, serial: &str) -> LedgerError {
	if is_unique_violation_on(&err, "users.serial") {
		LedgerError::DuplicateKey(format!("member serial {serial:?} already exists"))
	} else {
		err.into()
	}
}
