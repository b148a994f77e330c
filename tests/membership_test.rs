mod common;

use circulation_ledger::sql::{SEED_ADMIN_NAME, SEED_ADMIN_PASSWORD, SEED_ADMIN_SERIAL};
use circulation_ledger::types::{NewUser, PageRequest, UserUpdate};
use circulation_ledger::LedgerError;
use common::{date, ledger, member};

#[tokio::test]
async fn test_seed_admin_can_log_in() {
	let ledger = ledger().await;
	let admin = ledger.membership()
		.authenticate(SEED_ADMIN_NAME, SEED_ADMIN_PASSWORD)
		.await
		.expect("Failed to authenticate seed admin");
	assert_eq!(admin.serial, SEED_ADMIN_SERIAL);
	assert!(admin.is_admin);
}

#[tokio::test]
async fn test_duplicate_serial_adds_no_row() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Alice", "U1")).await.expect("Failed to create member");

	let dup = membership.create_user(member("Bob", "U1")).await;
	assert!(matches!(dup, Err(LedgerError::DuplicateKey(_))));

	let found = membership.search_users("", PageRequest::new(1, 10)).await.expect("Failed to search");
	// seed admin + Alice
	assert_eq!(found.total, 2);
	assert!(found.rows.iter().all(|m| m.name != "Bob"));
}

#[tokio::test]
async fn test_name_and_serial_are_required() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	assert!(matches!(
		membership.create_user(member("", "U1")).await,
		Err(LedgerError::Validation(_))
	));
	assert!(matches!(
		membership.create_user(member("Alice", " ")).await,
		Err(LedgerError::Validation(_))
	));
}

#[tokio::test]
async fn test_generated_password_authenticates() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	let created = membership.create_user(NewUser {
		name: "Dana".into(),
		serial: "U4".into(),
		dob: Some(date(1990, 5, 17)),
		..NewUser::default()
	}).await.expect("Failed to create member");

	let password = created.generated_password.expect("password should be generated");
	assert!(password.len() >= 8);
	let dana = membership.authenticate("Dana", &password).await.expect("Failed to authenticate");
	assert_eq!(dana.id, created.id);
	assert_eq!(dana.dob, Some(date(1990, 5, 17)));
	assert!(!dana.is_admin);

	let supplied = membership.create_user(member("Eve", "U5")).await.expect("Failed to create member");
	assert_eq!(supplied.generated_password, None);
}

#[tokio::test]
async fn test_wrong_password_fails() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Alice", "U1")).await.expect("Failed to create member");

	assert!(matches!(membership.authenticate("Alice", "nope").await, Err(LedgerError::AuthFailed)));
	assert!(matches!(membership.authenticate("Nobody", "x").await, Err(LedgerError::AuthFailed)));
	membership.authenticate("Alice", "Alice-pass").await.expect("Failed to authenticate");
}

#[tokio::test]
async fn test_grant_admin_replaces_password() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Alice", "U1")).await.expect("Failed to create member");
	assert_eq!(membership.non_admin_users().await.expect("non admins").len(), 1);

	membership.grant_admin("U1", "new-secret").await.expect("Failed to grant admin");

	let alice = membership.user_by_serial("U1").await.expect("Failed to fetch member");
	assert!(alice.is_admin);
	assert!(matches!(membership.authenticate("Alice", "Alice-pass").await, Err(LedgerError::AuthFailed)));
	membership.authenticate("Alice", "new-secret").await.expect("Failed to authenticate");
	assert!(membership.non_admin_users().await.expect("non admins").is_empty());

	assert!(matches!(membership.grant_admin("U9", "x").await, Err(LedgerError::NotFound(_))));
	assert!(matches!(membership.grant_admin("U1", "").await, Err(LedgerError::Validation(_))));
}

#[tokio::test]
async fn test_update_user_rules() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Alice", "U1")).await.expect("Failed to create member");
	membership.create_user(member("Bob", "U2")).await.expect("Failed to create member");

	let collide = membership.update_user("U1", UserUpdate {
		name: "Alice".into(),
		serial: "U2".into(),
		..UserUpdate::default()
	}).await;
	assert!(matches!(collide, Err(LedgerError::DuplicateKey(_))));

	let unknown = membership.update_user("U9", UserUpdate {
		name: "Zed".into(),
		serial: "U9".into(),
		..UserUpdate::default()
	}).await;
	assert!(matches!(unknown, Err(LedgerError::NotFound(_))));

	membership.update_user("U1", UserUpdate {
		name: "Alice Smith".into(),
		serial: "U1-B".into(),
		phone: Some("555-0100".into()),
		address: Some("  ".into()),
		..UserUpdate::default()
	}).await.expect("Failed to update");
	let alice = membership.user_by_serial("U1-B").await.expect("Failed to fetch member");
	assert_eq!(alice.name, "Alice Smith");
	assert_eq!(alice.phone.as_deref(), Some("555-0100"));
	assert_eq!(alice.address, None);
	// credentials survive the update
	membership.authenticate("Alice Smith", "Alice-pass").await.expect("Failed to authenticate");
}

#[tokio::test]
async fn test_search_users_by_name_or_serial() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Alice", "CARD-7")).await.expect("Failed to create member");
	membership.create_user(member("Bob", "CARD-8")).await.expect("Failed to create member");

	let by_serial = membership.search_users("card-8", PageRequest::new(1, 10)).await.expect("Failed to search");
	assert_eq!(by_serial.total, 1);
	assert_eq!(by_serial.rows[0].name, "Bob");

	let by_name = membership.search_users("ali", PageRequest::new(1, 10)).await.expect("Failed to search");
	assert_eq!(by_name.rows[0].serial, "CARD-7");

	assert_eq!(membership.user_names().await.expect("names"), vec!["Alice", "Bob", "admin"]);
}

#[tokio::test]
async fn test_search_users_folds_non_ascii_names() {
	let ledger = ledger().await;
	let membership = ledger.membership();
	membership.create_user(member("Øyvind Ås", "KORT-1")).await.expect("Failed to create member");

	let found = membership.search_users("øyvind", PageRequest::new(1, 10)).await.expect("Failed to search");
	assert_eq!(found.total, 1);
	assert_eq!(found.rows[0].serial, "KORT-1");

	membership.update_user("KORT-1", UserUpdate {
		name: "Ødegård".into(),
		serial: "KORT-1".into(),
		..UserUpdate::default()
	}).await.expect("Failed to update");
	let renamed = membership.search_users("ØDEGÅRD", PageRequest::new(1, 10)).await.expect("Failed to search");
	assert_eq!(renamed.total, 1);
}
