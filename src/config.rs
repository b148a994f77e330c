//! Process configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
	#[error("{0} not set in env")]
	Missing(&'static str),

	#[error("{name} has invalid value {value:?}")]
	Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub bind: String,
	pub max_connections: u32,
	pub acquire_timeout: Duration,
	pub busy_timeout: Duration,
	pub bcrypt_cost: u32,
	pub page_size: u32,
	pub session_ttl: Duration,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

		let bcrypt_cost = parse_or(&get, "LEDGER_BCRYPT_COST", bcrypt::DEFAULT_COST)?;
		if !(4..=31).contains(&bcrypt_cost) {
			return Err(ConfigError::Invalid { name: "LEDGER_BCRYPT_COST", value: bcrypt_cost.to_string() });
		}
		let page_size = parse_or(&get, "LEDGER_PAGE_SIZE", 10u32)?;
		if page_size == 0 {
			return Err(ConfigError::Invalid { name: "LEDGER_PAGE_SIZE", value: "0".to_string() });
		}

		Ok(Config {
			database_url,
			bind: get("LEDGER_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
			max_connections: parse_or(&get, "LEDGER_MAX_CONNECTIONS", 5)?,
			acquire_timeout: Duration::from_secs(parse_or(&get, "LEDGER_ACQUIRE_TIMEOUT_SECS", 3)?),
			busy_timeout: Duration::from_secs(parse_or(&get, "LEDGER_BUSY_TIMEOUT_SECS", 5)?),
			bcrypt_cost,
			page_size,
			session_ttl: Duration::from_secs(parse_or(&get, "LEDGER_SESSION_TTL_SECS", 8 * 60 * 60)?),
		})
	}
}

fn parse_or<T: FromStr>(
	get: &impl Fn(&str) -> Option<String>,
	name: &'static str,
	default: T,
) -> Result<T, ConfigError> {
	match get(name) {
		Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
		None => Ok(default),
	}
}
