// Shared settings for the restcheck binaries
// Environment variables override the defaults below

use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "reports/results.db";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub redis_url: String,
    pub api_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            api_addr: DEFAULT_API_ADDR.to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `RESTCHECK_DB`, `REDIS_URL` and `RESTCHECK_API_ADDR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(path) = lookup("RESTCHECK_DB").filter(|v| !v.is_empty()) {
            settings.db_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("REDIS_URL").filter(|v| !v.is_empty()) {
            settings.redis_url = url;
        }
        if let Some(addr) = lookup("RESTCHECK_API_ADDR").filter(|v| !v.is_empty()) {
            settings.api_addr = addr;
        }
        settings
    }
}
