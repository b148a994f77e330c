// library circulation ledger

pub mod catalog;
pub mod circulation;
pub mod config;
pub mod error;
pub mod membership;
pub mod report;
pub mod sql;
pub mod types;

use sqlx::sqlite::SqlitePool;

pub use catalog::Catalog;
pub use circulation::Circulation;
pub use config::Config;
pub use error::{LedgerError, Result};
pub use membership::Membership;
pub use report::{Report, ReportKind, Reports};

/// The managers over one injected store handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Ledger {
	db: SqlitePool,
	bcrypt_cost: u32,
}

impl Ledger {
	pub fn new(db: SqlitePool, bcrypt_cost: u32) -> Self {
		Ledger { db, bcrypt_cost }
	}

	/// Connects, provisions the schema and the seed admin.
	pub async fn open(config: &Config) -> Result<Self> {
		let db = sql::connect(config).await?;
		sql::provision(&db, config.bcrypt_cost).await?;
		Ok(Ledger::new(db, config.bcrypt_cost))
	}

	pub fn catalog(&self) -> Catalog {
		Catalog::new(self.db.clone())
	}

	pub fn membership(&self) -> Membership {
		Membership::new(self.db.clone(), self.bcrypt_cost)
	}

	pub fn circulation(&self) -> Circulation {
		Circulation::new(self.db.clone())
	}

	pub fn reports(&self) -> Reports {
		Reports::new(self.db.clone())
	}

	pub async fn close(&self) {
		self.db.close().await;
	}
}
