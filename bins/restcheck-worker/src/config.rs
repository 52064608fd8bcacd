// Runner configuration for restcheck-worker
use crate::evaluator::FailureReporting;
use anyhow::{bail, Context, Result};
use restcheck_common::config::Settings;
use restcheck_common::redis::DEFAULT_TTL_SECONDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/runner.json";
pub const DEFAULT_SUITE_PATH: &str = "suites/api_tests.json";
pub const DEFAULT_EXECUTION_PREFIX: &str = "TestExecution";

/// Where run results are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sqlite {
        path: PathBuf,
    },
    Redis {
        url: String,
        #[serde(default = "default_ttl")]
        ttl_seconds: u64,
    },
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub suite_path: PathBuf,
    pub store: StoreConfig,
    /// Passed to the HTTP client; unset keeps the client default
    pub request_timeout_ms: Option<u64>,
    pub failure_reporting: FailureReporting,
    pub execution_prefix: String,
    pub report_path: Option<PathBuf>,
    /// Save a timestamped copy of the suite with each record's outcome
    pub write_back: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::with_settings(&Settings::default())
    }
}

impl RunnerConfig {
    /// Defaults whose store location comes from the shared settings
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            suite_path: PathBuf::from(DEFAULT_SUITE_PATH),
            store: StoreConfig::Sqlite {
                path: settings.db_path.clone(),
            },
            request_timeout_ms: None,
            failure_reporting: FailureReporting::default(),
            execution_prefix: DEFAULT_EXECUTION_PREFIX.to_string(),
            report_path: None,
            write_back: false,
        }
    }

    /// Load from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Runner config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: RunnerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config the way the worker does at startup:
    /// `RESTCHECK_CONFIG` or `config/runner.json`, defaults when the default
    /// file is absent, then `RESTCHECK_SUITE` on top.
    pub fn load_default(settings: &Settings) -> Result<Self> {
        Self::resolve(settings, |key| std::env::var(key).ok())
    }

    fn resolve(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let explicit = lookup("RESTCHECK_CONFIG").filter(|v| !v.is_empty());

        let mut config = match explicit {
            Some(path) => Self::load(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::with_settings(settings),
        };

        if let Some(suite) = lookup("RESTCHECK_SUITE").filter(|v| !v.is_empty()) {
            config.suite_path = PathBuf::from(suite);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.execution_prefix.trim().is_empty() {
            bail!("execution_prefix must not be empty");
        }
        if self.request_timeout_ms == Some(0) {
            bail!("request_timeout_ms must be greater than zero");
        }
        if let StoreConfig::Redis { url, .. } = &self.store {
            if url.is_empty() {
                bail!("redis store needs a url");
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
