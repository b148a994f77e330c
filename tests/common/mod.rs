#![allow(dead_code)]

use chrono::NaiveDate;
use circulation_ledger::sql;
use circulation_ledger::types::NewUser;
use circulation_ledger::Ledger;

pub const TEST_COST: u32 = 4;

pub async fn ledger() -> Ledger {
	let db = sql::connect_memory().await.expect("open in-memory store");
	sql::provision(&db, TEST_COST).await.expect("provision");
	Ledger::new(db, TEST_COST)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
	NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn member(name: &str, serial: &str) -> NewUser {
	NewUser {
		name: name.to_string(),
		serial: serial.to_string(),
		password: Some(format!("{name}-pass")),
		..NewUser::default()
	}
}

/// Orwell, "1984" as S1 on Shelf A, and Alice as U1.
pub async fn orwell_scenario() -> Ledger {
	let ledger = ledger().await;
	ledger.catalog().create_author("Orwell", Some("")).await.expect("author");
	ledger.catalog().create_book("S1", "1984", "Orwell", Some("Shelf A")).await.expect("book");
	ledger.membership().create_user(member("Alice", "U1")).await.expect("member");
	ledger
}

pub async fn open_loans(ledger: &Ledger, serial: &str) -> usize {
	ledger.circulation().loans_for_book(serial).await.expect("loans")
		.iter()
		.filter(|loan| loan.is_open())
		.count()
}
