// library circulation front end

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
	extract::{Query, State},
	http::{header, StatusCode},
	response::{IntoResponse, Redirect, Response},
	routing::{get, post},
	Form,
};
use chrono::NaiveDate;
use maud::{html, Markup, DOCTYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use circulation_ledger::types::{BookOrder, BookUpdate, Lookup, NewUser, PageRequest};
use circulation_ledger::{Config, Ledger, LedgerError, ReportKind};

const SESSION_COOKIE: &str = "session";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = Config::from_env()?;
	let ledger = Ledger::open(&config).await?;

	let state = AppState {
		ledger: ledger.clone(),
		sessions: Sessions::new(config.session_ttl),
		page_size: config.page_size,
	};

	let listener = tokio::net::TcpListener::bind(&config.bind).await?;
	info!(bind = %config.bind, "listening");
	axum::serve(listener, app(state))
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	ledger.close().await;
	info!("store closed");
	Ok(())
}

fn app(state: AppState) -> axum::Router {
	axum::Router::new()
		.route("/", get(display_books))
		.route("/login", get(display_login).post(perform_login))
		.route("/logout", get(perform_logout))
		.route("/circulation", get(display_circulation))
		.route("/issue", post(perform_issue))
		.route("/return", post(perform_return))
		.route("/books", post(perform_add_book))
		.route("/books/edit", post(perform_edit_book))
		.route("/authors", get(display_authors).post(perform_add_author))
		.route("/members", get(display_members).post(perform_add_member))
		.route("/admin", get(display_admin).post(perform_grant_admin))
		.route("/report", get(display_report))
		.route("/report.csv", get(download_report))
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		error!(error = %e, "failed to listen for shutdown signal");
	}
}

#[derive(Clone)]
struct AppState {
	ledger: Ledger,
	sessions: Sessions,
	page_size: u32,
}

#[derive(Debug, Clone)]
struct Session {
	name: String,
	is_admin: bool,
	issued: Instant,
}

/// Logged-in clerks by cookie token. Entries older than `ttl` are dropped
/// on lookup and whenever a new session opens.
#[derive(Clone)]
struct Sessions {
	inner: Arc<Mutex<HashMap<Uuid, Session>>>,
	ttl: Duration,
}

impl Sessions {
	fn new(ttl: Duration) -> Self {
		Sessions { inner: Arc::new(Mutex::new(HashMap::new())), ttl }
	}

	fn expired(&self, session: &Session) -> bool {
		session.issued.elapsed() >= self.ttl
	}

	async fn open(&self, name: String, is_admin: bool) -> Uuid {
		let token = Uuid::new_v4();
		let mut sessions = self.inner.lock().await;
		let before = sessions.len();
		sessions.retain(|_, session| !self.expired(session));
		if sessions.len() < before {
			debug!(dropped = before - sessions.len(), "stale sessions dropped");
		}
		sessions.insert(token, Session { name, is_admin, issued: Instant::now() });
		token
	}

	async fn get(&self, token: &Uuid) -> Option<Session> {
		let mut sessions = self.inner.lock().await;
		let session = sessions.get(token)?.clone();
		if self.expired(&session) {
			sessions.remove(token);
			return None;
		}
		Some(session)
	}

	async fn close(&self, token: &Uuid) {
		self.inner.lock().await.remove(token);
	}

	#[cfg(test)]
	async fn len(&self) -> usize {
		self.inner.lock().await.len()
	}
}

async fn current_session(state: &AppState, cookies: &Cookies) -> Option<Session> {
	let token = cookies.get(SESSION_COOKIE)?;
	let token = Uuid::parse_str(token.value()).ok()?;
	state.sessions.get(&token).await
}

async fn require_session(state: &AppState, cookies: &Cookies) -> Result<Session, PageError> {
	current_session(state, cookies).await.ok_or(PageError(LedgerError::AuthFailed))
}

async fn require_admin(state: &AppState, cookies: &Cookies) -> Result<Session, PageError> {
	let session = require_session(state, cookies).await?;
	if !session.is_admin {
		return Err(PageError(LedgerError::AuthFailed));
	}
	Ok(session)
}

/// Ledger failures rendered as a page with a matching status.
struct PageError(LedgerError);

impl From<LedgerError> for PageError {
	fn from(err: LedgerError) -> Self {
		PageError(err)
	}
}

impl IntoResponse for PageError {
	fn into_response(self) -> Response {
		let status = match &self.0 {
			LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
			LedgerError::DuplicateKey(_) | LedgerError::InvalidState(_) | LedgerError::Ambiguous(_) => StatusCode::CONFLICT,
			LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
			LedgerError::AuthFailed => StatusCode::UNAUTHORIZED,
			LedgerError::Timeout => StatusCode::GATEWAY_TIMEOUT,
			LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			LedgerError::Credential(_) | LedgerError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			error!(error = %self.0, "request failed");
		}
		let body = layout("Error", html! {
			p class="error" { (self.0) }
			a href="javascript:history.back()" { "Back" }
		});
		(status, body).into_response()
	}
}

fn layout(title: &str, body: Markup) -> Markup {
	html! {
		(DOCTYPE)
		html {
			head { title { (title) " | Library" } }
			body {
				nav {
					a href="/" { "Books" } " "
					a href="/authors" { "Authors" } " "
					a href="/members" { "Members" } " "
					a href="/circulation" { "Circulation" } " "
					a href="/report" { "Reports" } " "
					a href="/admin" { "Admin" } " "
					a href="/login" { "Login" } " "
					a href="/logout" { "Logout" }
				}
				h1 { (title) }
				(body)
			}
		}
	}
}

#[derive(Serialize)]
struct PageLink<'a> {
	q: &'a str,
	page: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	order: Option<BookOrder>,
}

fn page_href(path: &str, link: &PageLink<'_>) -> String {
	match serde_urlencoded::to_string(link) {
		Ok(query) => format!("{path}?{query}"),
		Err(e) => {
			error!(error = %e, "failed to encode page link");
			path.to_string()
		},
	}
}

fn pager(path: &str, q: &str, order: Option<BookOrder>, page: u32, last: bool) -> Markup {
	html! {
		p {
			@if page > 1 {
				a href=(page_href(path, &PageLink { q, page: page - 1, order })) { "Previous" } " "
			}
			"Page " (page)
			@if !last {
				" " a href=(page_href(path, &PageLink { q, page: page + 1, order })) { "Next" }
			}
		}
	}
}

fn parse_date(field: &str, value: &str) -> Result<Option<NaiveDate>, LedgerError> {
	let value = value.trim();
	if value.is_empty() {
		return Ok(None);
	}
	NaiveDate::parse_from_str(value, "%Y-%m-%d")
		.map(Some)
		.map_err(|_| LedgerError::Validation(format!("{field} must be YYYY-MM-DD")))
}

fn required_date(field: &str, value: &str) -> Result<NaiveDate, LedgerError> {
	parse_date(field, value)?.ok_or_else(|| LedgerError::Validation(format!("{field} is required")))
}

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
	q: Option<String>,
	page: Option<u32>,
	order: Option<BookOrder>,
}

async fn display_books(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<SearchParams>,
) -> Result<Markup, PageError> {
	require_session(&state, &cookies).await?;
	let q = params.q.unwrap_or_default();
	let order = params.order.unwrap_or_default();
	let page = PageRequest::new(params.page.unwrap_or(1), state.page_size);
	let books = state.ledger.catalog().search_books(&q, page, order).await?;

	Ok(layout("Books", html! {
		form method="GET" action="/" {
			input name="q" type="search" placeholder="title or author" value=(q) {}
			select name="order" {
				option value="title" selected[order == BookOrder::Title] { "Title" }
				option value="serial" selected[order == BookOrder::Serial] { "Serial" }
				option value="author" selected[order == BookOrder::Author] { "Author" }
			}
			button { "Search" }
		}
		table {
			thead { tr {
				th { "Serial" } th { "Title" } th { "Author" } th { "Held by" } th { "Location" }
			} }
			tbody {
				@for book in &books.rows {
					tr {
						td { (book.serial) }
						td { (book.title) }
						td { (book.author) }
						td { (book.holder) }
						td { (book.location.as_deref().unwrap_or("")) }
					}
				}
			}
		}
		p { (books.total) " books" }
		(pager("/", &q, Some(order), books.page, books.is_last()))
		h2 { "Add book" }
		form method="POST" action="/books" {
			input name="serial" placeholder="serial" {}
			input name="title" placeholder="title" {}
			input name="author" placeholder="author" {}
			input name="location" placeholder="location" {}
			button { "Add" }
		}
		h2 { "Edit book" }
		form method="POST" action="/books/edit" {
			input name="old_serial" placeholder="current serial" {}
			input name="serial" placeholder="new serial" {}
			input name="title" placeholder="title" {}
			input name="location" placeholder="location" {}
			button { "Save" }
		}
	}))
}

#[derive(Deserialize, Debug)]
struct FormBook {
	serial: String,
	title: String,
	author: String,
	location: String,
}

async fn perform_add_book(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(book): Form<FormBook>,
) -> Result<Redirect, PageError> {
	require_session(&state, &cookies).await?;
	state.ledger.catalog()
		.create_book(&book.serial, &book.title, &book.author, Some(&book.location)).await?;
	Ok(Redirect::to("/"))
}

#[derive(Deserialize, Debug)]
struct FormEditBook {
	old_serial: String,
	serial: String,
	title: String,
	location: String,
}

async fn perform_edit_book(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(edit): Form<FormEditBook>,
) -> Result<Redirect, PageError> {
	require_session(&state, &cookies).await?;
	state.ledger.catalog().update_book(&edit.old_serial, BookUpdate {
		serial: edit.serial,
		title: edit.title,
		location: Some(edit.location),
	}).await?;
	Ok(Redirect::to("/"))
}

#[derive(Deserialize, Debug, Default)]
struct PageParams {
	q: Option<String>,
	page: Option<u32>,
}

async fn display_authors(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<PageParams>,
) -> Result<Markup, PageError> {
	require_session(&state, &cookies).await?;
	let q = params.q.unwrap_or_default();
	let page = PageRequest::new(params.page.unwrap_or(1), state.page_size);
	let authors = state.ledger.catalog().list_authors(Some(&q), page).await?;

	Ok(layout("Authors", html! {
		table {
			thead { tr { th { "Name" } th { "Details" } } }
			tbody {
				@for author in &authors.rows {
					tr {
						td { (author.name) }
						td { (author.details.as_deref().unwrap_or("")) }
					}
				}
			}
		}
		(pager("/authors", &q, None, authors.page, authors.is_last()))
		form method="POST" action="/authors" {
			input name="name" placeholder="name" {}
			input name="details" placeholder="details" {}
			button { "Add author" }
		}
	}))
}

#[derive(Deserialize, Debug)]
struct FormAuthor {
	name: String,
	details: String,
}

async fn perform_add_author(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(author): Form<FormAuthor>,
) -> Result<Redirect, PageError> {
	require_session(&state, &cookies).await?;
	state.ledger.catalog().create_author(&author.name, Some(&author.details)).await?;
	Ok(Redirect::to("/authors"))
}

async fn display_login() -> Markup {
	layout("Login", html! {
		form method="POST" action="/login" {
			input name="name" placeholder="username" {}
			input name="pass" type="password" placeholder="password" {}
			button { "LogIn" }
		}
	})
}

#[derive(Deserialize, Debug)]
struct FormLogin {
	name: String,
	pass: String,
}

async fn perform_login(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(login): Form<FormLogin>,
) -> Result<Redirect, PageError> {
	let member = state.ledger.membership().authenticate(&login.name, &login.pass).await?;
	let token = state.sessions.open(member.name, member.is_admin).await;
	let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
	cookie.set_http_only(true);
	cookie.set_path("/");
	cookies.add(cookie);
	Ok(Redirect::to("/"))
}

async fn perform_logout(State(state): State<AppState>, cookies: Cookies) -> Redirect {
	if let Some(token) = cookies.get(SESSION_COOKIE) {
		if let Ok(token) = Uuid::parse_str(token.value()) {
			state.sessions.close(&token).await;
		}
	}
	let mut cookie = Cookie::new(SESSION_COOKIE, "");
	cookie.set_path("/");
	cookies.remove(cookie);
	Redirect::to("/login")
}

#[derive(Deserialize, Debug, Default)]
struct CirculationParams {
	member: Option<String>,
}

async fn display_circulation(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<CirculationParams>,
) -> Result<Markup, PageError> {
	require_session(&state, &cookies).await?;
	let circulation = state.ledger.circulation();
	let available = circulation.available_books().await?;
	let member = params.member.unwrap_or_default();
	let open = if member.trim().is_empty() {
		Vec::new()
	} else {
		circulation.open_loans_for(Lookup::Name(member.trim())).await?
	};

	Ok(layout("Circulation", html! {
		h2 { "Issue" }
		form method="POST" action="/issue" {
			input name="user" placeholder="member" {}
			input name="book" placeholder="book title" {}
			input name="date" type="date" {}
			label { input name="by_serial" type="checkbox" value="on" {} " by serial" }
			button { "Issue" }
		}
		h2 { "Return" }
		form method="POST" action="/return" {
			input name="user" placeholder="member" value=(member) {}
			input name="book" placeholder="book title" {}
			input name="date" type="date" {}
			label { input name="by_serial" type="checkbox" value="on" {} " by serial" }
			button { "Return" }
		}
		@if !member.trim().is_empty() {
			h3 { "On loan to " (member) }
			ul {
				@for loan in &open {
					li { (loan.title) " (" (loan.serial) ") since " (loan.issue_date) }
				}
			}
		}
		form method="GET" action="/circulation" {
			input name="member" placeholder="member" value=(member) {}
			button { "Show loans" }
		}
		h2 { "Available" }
		ul {
			@for book in &available {
				li { (book.title) " (" (book.serial) ") by " (book.author) }
			}
		}
	}))
}

#[derive(Deserialize, Debug)]
struct FormLoan {
	user: String,
	book: String,
	date: String,
	by_serial: Option<String>,
}

impl FormLoan {
	fn lookups(&self) -> (Lookup<'_>, Lookup<'_>) {
		let (user, book) = (self.user.trim(), self.book.trim());
		if self.by_serial.is_some() {
			(Lookup::Serial(user), Lookup::Serial(book))
		} else {
			(Lookup::Name(user), Lookup::Name(book))
		}
	}
}

async fn perform_issue(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(loan): Form<FormLoan>,
) -> Result<Redirect, PageError> {
	require_session(&state, &cookies).await?;
	if loan.user.trim().is_empty() || loan.book.trim().is_empty() {
		return Err(LedgerError::validation("please select both user and book").into());
	}
	let date = required_date("issue date", &loan.date)?;
	let (user, book) = loan.lookups();
	state.ledger.circulation().issue_book(user, book, date).await?;
	Ok(Redirect::to("/circulation"))
}

async fn perform_return(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(loan): Form<FormLoan>,
) -> Result<Redirect, PageError> {
	require_session(&state, &cookies).await?;
	if loan.user.trim().is_empty() || loan.book.trim().is_empty() {
		return Err(LedgerError::validation("please select both user and book").into());
	}
	let date = required_date("return date", &loan.date)?;
	let (user, book) = loan.lookups();
	state.ledger.circulation().return_book(user, book, date).await?;
	Ok(Redirect::to("/circulation"))
}

async fn display_members(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<PageParams>,
) -> Result<Markup, PageError> {
	require_session(&state, &cookies).await?;
	let q = params.q.unwrap_or_default();
	let page = PageRequest::new(params.page.unwrap_or(1), state.page_size);
	let members = state.ledger.membership().search_users(&q, page).await?;

	Ok(layout("Members", html! {
		form method="GET" action="/members" {
			input name="q" type="search" placeholder="name or serial" value=(q) {}
			button { "Search" }
		}
		table {
			thead { tr { th { "Name" } th { "Serial" } th { "Date of birth" } th { "Phone" } } }
			tbody {
				@for member in &members.rows {
					tr {
						td { (member.name) }
						td { (member.serial) }
						td { (member.dob.map(|d| d.to_string()).unwrap_or_default()) }
						td { (member.phone.as_deref().unwrap_or("")) }
					}
				}
			}
		}
		(pager("/members", &q, None, members.page, members.is_last()))
		h2 { "Create member" }
		form method="POST" action="/members" {
			input name="name" placeholder="full name" {}
			input name="serial" placeholder="serial number" {}
			input name="dob" type="date" {}
			input name="phone" placeholder="phone" {}
			input name="address" placeholder="address" {}
			button { "Create" }
		}
	}))
}

#[derive(Deserialize, Debug)]
struct FormMember {
	name: String,
	serial: String,
	dob: String,
	phone: String,
	address: String,
}

async fn perform_add_member(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(form): Form<FormMember>,
) -> Result<Markup, PageError> {
	require_session(&state, &cookies).await?;
	let created = state.ledger.membership().create_user(NewUser {
		dob: parse_date("date of birth", &form.dob)?,
		name: form.name,
		serial: form.serial,
		phone: Some(form.phone),
		address: Some(form.address),
		password: None,
	}).await?;

	Ok(layout("Member created", html! {
		@if let Some(password) = &created.generated_password {
			p { "Initial password: " code { (password) } }
		}
		a href="/members" { "Back to members" }
	}))
}

async fn display_admin(
	State(state): State<AppState>,
	cookies: Cookies,
) -> Result<Markup, PageError> {
	let session = require_admin(&state, &cookies).await?;
	let candidates = state.ledger.membership().non_admin_users().await?;

	Ok(layout("Admin", html! {
		p { "Signed in as " (session.name) }
		form method="POST" action="/admin" {
			select name="serial" {
				@for member in &candidates {
					option value=(member.serial) { (member.name) " (" (member.serial) ")" }
				}
			}
			input name="pass" type="password" placeholder="new password" {}
			input name="confirm" type="password" placeholder="confirm password" {}
			button { "Grant admin" }
		}
	}))
}

#[derive(Deserialize, Debug)]
struct FormGrant {
	serial: String,
	pass: String,
	confirm: String,
}

async fn perform_grant_admin(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(grant): Form<FormGrant>,
) -> Result<Redirect, PageError> {
	require_admin(&state, &cookies).await?;
	if grant.pass != grant.confirm {
		return Err(LedgerError::validation("passwords don't match").into());
	}
	state.ledger.membership().grant_admin(&grant.serial, &grant.pass).await?;
	Ok(Redirect::to("/admin"))
}

#[derive(Deserialize, Debug, Default)]
struct ReportParams {
	kind: Option<ReportKind>,
}

async fn display_report(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<ReportParams>,
) -> Result<Markup, PageError> {
	require_admin(&state, &cookies).await?;
	let kind = params.kind.unwrap_or_default();
	let report = state.ledger.reports().generate(kind).await?;

	Ok(layout(kind.title(), html! {
		form method="GET" action="/report" {
			select name="kind" {
				option value="all_copies" { "All books" }
				option value="currently_issued" { "Issued books" }
				option value="history" { "Transaction history" }
			}
			button { "Generate" }
		}
		@if report.is_empty() {
			p { "No data found for the selected report type." }
		} @else {
			table {
				thead { tr { @for column in report.columns() { th { (column) } } } }
				tbody {
					@for record in report.records() {
						tr { @for cell in &record { td { (cell) } } }
					}
				}
			}
			a href={ "/report.csv?kind=" (kind_param(kind)) } { "Export CSV" }
		}
	}))
}

fn kind_param(kind: ReportKind) -> &'static str {
	match kind {
		ReportKind::AllCopies => "all_copies",
		ReportKind::CurrentlyIssued => "currently_issued",
		ReportKind::History => "history",
	}
}

async fn download_report(
	State(state): State<AppState>,
	cookies: Cookies,
	Query(params): Query<ReportParams>,
) -> Result<Response, PageError> {
	require_admin(&state, &cookies).await?;
	let kind = params.kind.unwrap_or_default();
	let report = state.ledger.reports().generate(kind).await?;
	let mut body = Vec::new();
	report.write_csv(&mut body)?;

	let disposition = format!("attachment; filename=\"{}.csv\"", kind_param(kind));
	Ok((
		[
			(header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
			(header::CONTENT_DISPOSITION, disposition),
		],
		body,
	).into_response())
}

#[cfg(test)]
mod tests {
	use axum::body::Body;
	use axum::http::Request;
	use circulation_ledger::sql;
	use tower::ServiceExt;

	use super::*;

	async fn test_state(ttl: Duration) -> AppState {
		let db = sql::connect_memory().await.unwrap();
		sql::provision(&db, 4).await.unwrap();
		AppState {
			ledger: Ledger::new(db, 4),
			sessions: Sessions::new(ttl),
			page_size: 10,
		}
	}

	async fn get_status(app: &axum::Router, uri: &str, cookie: Option<&str>) -> StatusCode {
		let mut req = Request::builder().uri(uri);
		if let Some(cookie) = cookie {
			req = req.header(header::COOKIE, cookie);
		}
		app.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap().status()
	}

	async fn log_in(app: &axum::Router, name: &str, pass: &str) -> String {
		let req = Request::builder()
			.method("POST")
			.uri("/login")
			.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(Body::from(format!("name={name}&pass={pass}")))
			.unwrap();
		let res = app.clone().oneshot(req).await.unwrap();
		assert_eq!(res.status(), StatusCode::SEE_OTHER);
		let set_cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
		set_cookie.split(';').next().unwrap().to_string()
	}

	#[tokio::test]
	async fn read_pages_need_a_session() {
		let app = app(test_state(Duration::from_secs(60)).await);
		for uri in ["/", "/authors", "/members", "/circulation", "/report", "/report.csv?kind=history"] {
			assert_eq!(get_status(&app, uri, None).await, StatusCode::UNAUTHORIZED, "{uri}");
		}
		assert_eq!(get_status(&app, "/login", None).await, StatusCode::OK);
	}

	#[tokio::test]
	async fn reports_are_for_admins() {
		let state = test_state(Duration::from_secs(60)).await;
		state.ledger.membership().create_user(NewUser {
			name: "Alice".into(),
			serial: "U1".into(),
			password: Some("secret".into()),
			..NewUser::default()
		}).await.unwrap();
		let app = app(state);

		let member = log_in(&app, "Alice", "secret").await;
		assert_eq!(get_status(&app, "/", Some(&member)).await, StatusCode::OK);
		assert_eq!(get_status(&app, "/members", Some(&member)).await, StatusCode::OK);
		assert_eq!(get_status(&app, "/report", Some(&member)).await, StatusCode::UNAUTHORIZED);

		let admin = log_in(&app, sql::SEED_ADMIN_NAME, sql::SEED_ADMIN_PASSWORD).await;
		assert_eq!(get_status(&app, "/report", Some(&admin)).await, StatusCode::OK);
	}

	#[tokio::test]
	async fn stale_sessions_are_dropped() {
		let sessions = Sessions::new(Duration::ZERO);
		let first = sessions.open("Alice".into(), false).await;
		sessions.open("Bob".into(), false).await;
		// opening Bob's session swept Alice's
		assert_eq!(sessions.len().await, 1);
		assert!(sessions.get(&first).await.is_none());

		let sessions = Sessions::new(Duration::from_secs(60));
		let token = sessions.open("Alice".into(), true).await;
		assert!(sessions.get(&token).await.is_some_and(|s| s.is_admin));
		sessions.close(&token).await;
		assert_eq!(sessions.len().await, 0);
	}

	#[test]
	fn page_links_are_encoded() {
		let link = PageLink { q: "war & peace #2", page: 2, order: Some(BookOrder::Author) };
		assert_eq!(page_href("/", &link), "/?q=war+%26+peace+%232&page=2&order=author");

		let link = PageLink { q: "", page: 1, order: None };
		assert_eq!(page_href("/members", &link), "/members?q=&page=1");
	}
}
