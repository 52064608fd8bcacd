//! Persistence backends for run results.
//!
//! The orchestrator only talks to [`ResultStore`]; which backend sits behind it
//! is decided at startup from the runner configuration.

use crate::types::{ExecutionId, ExecutionSummary, TestResult};
use crate::{redis as keys, sqlite};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to prepare `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid execution id `{0}`")]
    InvalidExecutionId(String),
}

/// Sink for one run: allocates the run id, then receives every result and
/// finally the summary.
#[allow(async_fn_in_trait)]
pub trait ResultStore {
    async fn create_execution(&mut self, name: &str) -> Result<ExecutionId, StoreError>;

    async fn insert_result(
        &mut self,
        execution_id: &ExecutionId,
        result: &TestResult,
    ) -> Result<(), StoreError>;

    async fn insert_summary(
        &mut self,
        execution_id: &ExecutionId,
        summary: &ExecutionSummary,
    ) -> Result<(), StoreError>;
}

fn numeric_id<T: std::str::FromStr>(execution_id: &ExecutionId) -> Result<T, StoreError> {
    execution_id
        .0
        .parse()
        .map_err(|_| StoreError::InvalidExecutionId(execution_id.0.clone()))
}

pub struct SqliteStore {
    conn: rusqlite::Connection,
}

impl SqliteStore {
    /// Open the database file, creating its parent directory if missing
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            conn: sqlite::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: sqlite::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl ResultStore for SqliteStore {
    async fn create_execution(&mut self, name: &str) -> Result<ExecutionId, StoreError> {
        let id = sqlite::insert_execution(&self.conn, name)?;
        debug!(execution_id = id, name, "Execution row created");
        Ok(ExecutionId(id.to_string()))
    }

    async fn insert_result(
        &mut self,
        execution_id: &ExecutionId,
        result: &TestResult,
    ) -> Result<(), StoreError> {
        sqlite::insert_result(&self.conn, numeric_id(execution_id)?, result)?;
        Ok(())
    }

    async fn insert_summary(
        &mut self,
        execution_id: &ExecutionId,
        summary: &ExecutionSummary,
    ) -> Result<(), StoreError> {
        sqlite::insert_summary(&self.conn, numeric_id(execution_id)?, summary)?;
        Ok(())
    }
}

pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
    ttl_seconds: u64,
}

impl RedisStore {
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self, StoreError> {
        let conn = keys::connect(url).await?;
        Ok(Self { conn, ttl_seconds })
    }
}

impl ResultStore for RedisStore {
    async fn create_execution(&mut self, name: &str) -> Result<ExecutionId, StoreError> {
        let id = keys::create_execution(&mut self.conn, name, self.ttl_seconds).await?;
        Ok(ExecutionId(id.to_string()))
    }

    async fn insert_result(
        &mut self,
        execution_id: &ExecutionId,
        result: &TestResult,
    ) -> Result<(), StoreError> {
        let id = numeric_id(execution_id)?;
        keys::push_result(&mut self.conn, id, result, self.ttl_seconds).await?;
        Ok(())
    }

    async fn insert_summary(
        &mut self,
        execution_id: &ExecutionId,
        summary: &ExecutionSummary,
    ) -> Result<(), StoreError> {
        let id = numeric_id(execution_id)?;
        keys::store_summary(&mut self.conn, id, summary, self.ttl_seconds).await?;
        Ok(())
    }
}

/// Backend chosen at runtime.
pub enum Store {
    Sqlite(SqliteStore),
    Redis(RedisStore),
}

impl ResultStore for Store {
    async fn create_execution(&mut self, name: &str) -> Result<ExecutionId, StoreError> {
        match self {
            Store::Sqlite(store) => store.create_execution(name).await,
            Store::Redis(store) => store.create_execution(name).await,
        }
    }

    async fn insert_result(
        &mut self,
        execution_id: &ExecutionId,
        result: &TestResult,
    ) -> Result<(), StoreError> {
        match self {
            Store::Sqlite(store) => store.insert_result(execution_id, result).await,
            Store::Redis(store) => store.insert_result(execution_id, result).await,
        }
    }

    async fn insert_summary(
        &mut self,
        execution_id: &ExecutionId,
        summary: &ExecutionSummary,
    ) -> Result<(), StoreError> {
        match self {
            Store::Sqlite(store) => store.insert_summary(execution_id, summary).await,
            Store::Redis(store) => store.insert_summary(execution_id, summary).await,
        }
    }
}
