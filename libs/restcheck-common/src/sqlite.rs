// SQLite persistence for executions, per-case results and run summaries

use crate::types::{ExecutionSummary, TestResult, TestStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS test_executions (
    ExecutionId INTEGER PRIMARY KEY AUTOINCREMENT,
    ExecutionName TEXT NOT NULL,
    ExecutionDate TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS test_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ExecutionId INTEGER NOT NULL,
    TestId TEXT NOT NULL,
    TestCase TEXT NOT NULL,
    Status TEXT NOT NULL,
    Error TEXT,
    Date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    Method TEXT NOT NULL,
    URL TEXT NOT NULL,
    Endpoint TEXT NOT NULL,
    ExpectedStatusCode INT NOT NULL,
    ActualStatusCode INT,
    Duration REAL,
    ResponseSize INT,
    FOREIGN KEY (ExecutionId) REFERENCES test_executions(ExecutionId)
);
CREATE TABLE IF NOT EXISTS test_summary (
    ExecutionId INTEGER PRIMARY KEY,
    TotalTests INT NOT NULL,
    PassedTests INT NOT NULL,
    FailedTests INT NOT NULL,
    SkippedTests INT NOT NULL,
    AvgDuration REAL NOT NULL,
    TotalResponseSize INT NOT NULL,
    FOREIGN KEY (ExecutionId) REFERENCES test_executions(ExecutionId)
);
";

const RESULT_COLUMNS: &str = "ExecutionId, Date, TestId, TestCase, Status, Error, Method, URL, Endpoint, \
     ExpectedStatusCode, ActualStatusCode, Duration, ResponseSize";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub name: String,
    pub date: String,
}

/// A persisted result together with the run it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResult {
    pub execution_id: i64,
    pub date: String,
    #[serde(flatten)]
    pub result: TestResult,
}

/// Open the results database at `path`, creating the tables if needed.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    create_tables(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

pub fn insert_execution(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO test_executions (ExecutionName) VALUES (?1)",
        params![name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_result(conn: &Connection, execution_id: i64, result: &TestResult) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO test_results
            (ExecutionId, TestId, TestCase, Status, Error, Method, URL, Endpoint,
             ExpectedStatusCode, ActualStatusCode, Duration, ResponseSize)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            execution_id,
            result.id,
            result.name,
            result.status.as_str(),
            result.error,
            result.method.as_str(),
            result.url,
            result.endpoint,
            result.expected_status_code,
            result.actual_status_code,
            result.duration_seconds,
            result.response_size_bytes.map(|s| s as i64),
        ],
    )?;
    Ok(())
}

pub fn insert_summary(
    conn: &Connection,
    execution_id: i64,
    summary: &ExecutionSummary,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO test_summary
            (ExecutionId, TotalTests, PassedTests, FailedTests, SkippedTests, AvgDuration, TotalResponseSize)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            execution_id,
            summary.total_tests as i64,
            summary.passed_tests as i64,
            summary.failed_tests as i64,
            summary.skipped_tests as i64,
            summary.avg_duration_seconds,
            summary.total_response_size_bytes as i64,
        ],
    )?;
    Ok(())
}

/// All executions, most recent first.
pub fn list_executions(conn: &Connection) -> rusqlite::Result<Vec<ExecutionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT ExecutionId, ExecutionName, ExecutionDate FROM test_executions ORDER BY ExecutionId DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ExecutionRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            date: row.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn execution_name(conn: &Connection, execution_id: i64) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT ExecutionName FROM test_executions WHERE ExecutionId = ?1",
        params![execution_id],
        |row| row.get(0),
    )
    .optional()
}

/// Results in insertion order, optionally restricted to one execution.
/// `page` is zero-based.
pub fn fetch_results(
    conn: &Connection,
    execution_id: Option<i64>,
    page: u32,
    page_size: u32,
) -> rusqlite::Result<Vec<StoredResult>> {
    let limit = i64::from(page_size);
    let offset = i64::from(page) * limit;
    match execution_id {
        Some(id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM test_results WHERE ExecutionId = ?1 ORDER BY id LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![id, limit, offset], stored_result_from_row)?;
            rows.collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM test_results ORDER BY id LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], stored_result_from_row)?;
            rows.collect()
        }
    }
}

pub fn fetch_summary(conn: &Connection, execution_id: i64) -> rusqlite::Result<Option<ExecutionSummary>> {
    conn.query_row(
        "SELECT TotalTests, PassedTests, FailedTests, SkippedTests, AvgDuration, TotalResponseSize
         FROM test_summary WHERE ExecutionId = ?1",
        params![execution_id],
        |row| {
            Ok(ExecutionSummary {
                total_tests: row.get::<_, i64>(0)? as u64,
                passed_tests: row.get::<_, i64>(1)? as u64,
                failed_tests: row.get::<_, i64>(2)? as u64,
                skipped_tests: row.get::<_, i64>(3)? as u64,
                avg_duration_seconds: row.get(4)?,
                total_response_size_bytes: row.get::<_, i64>(5)? as u64,
            })
        },
    )
    .optional()
}

/// Number of stored results, optionally for one execution.
pub fn count_results(conn: &Connection, execution_id: Option<i64>) -> rusqlite::Result<u64> {
    let count: i64 = match execution_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM test_results WHERE ExecutionId = ?1",
            params![id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM test_results", [], |row| row.get(0))?,
    };
    Ok(count as u64)
}

/// Result count per status for one execution, in `Status` order.
pub fn status_counts(conn: &Connection, execution_id: i64) -> rusqlite::Result<Vec<(TestStatus, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT Status, COUNT(*) FROM test_results WHERE ExecutionId = ?1 GROUP BY Status ORDER BY Status",
    )?;
    let rows = stmt.query_map(params![execution_id], |row| {
        Ok((parse_column(row, 0)?, row.get::<_, i64>(1)? as u64))
    })?;
    rows.collect()
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn stored_result_from_row(row: &Row<'_>) -> rusqlite::Result<StoredResult> {
    Ok(StoredResult {
        execution_id: row.get(0)?,
        date: row.get(1)?,
        result: TestResult {
            id: row.get(2)?,
            name: row.get(3)?,
            status: parse_column(row, 4)?,
            error: row.get(5)?,
            method: parse_column(row, 6)?,
            url: row.get(7)?,
            endpoint: row.get(8)?,
            expected_status_code: row.get(9)?,
            actual_status_code: row.get(10)?,
            duration_seconds: row.get(11)?,
            response_size_bytes: row.get::<_, Option<i64>>(12)?.map(|s| s as u64),
        },
    })
}
