//! Relay configuration from the environment.
//!
//! Every key is optional. Unset or unparsable values fall back to the
//! defaults below; `DATABASE_URL` unset means the relay keeps boards in
//! memory only.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_RECORD_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Largest serialized record accepted by `element:append`.
    pub max_record_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            max_record_bytes: env_parse("MAX_RECORD_BYTES", DEFAULT_MAX_RECORD_BYTES),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
