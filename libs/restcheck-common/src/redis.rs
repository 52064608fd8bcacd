use crate::types::{ExecutionSummary, TestResult};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Redis key layout for persisted runs.
/// Keys are deterministic so the worker and any reader agree on them.

pub const EXECUTION_SEQ_KEY: &str = "restcheck:execution:seq";
pub const EXECUTION_INDEX_KEY: &str = "restcheck:executions";
pub const EXECUTION_PREFIX: &str = "restcheck:execution";
pub const RESULTS_PREFIX: &str = "restcheck:results";
pub const SUMMARY_PREFIX: &str = "restcheck:summary";

/// Default retention for run data: 24 hours
pub const DEFAULT_TTL_SECONDS: u64 = 86400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub id: u64,
    pub name: String,
    pub started_at: String,
}

pub fn execution_key(execution_id: u64) -> String {
    format!("{}:{}", EXECUTION_PREFIX, execution_id)
}

pub fn results_key(execution_id: u64) -> String {
    format!("{}:{}", RESULTS_PREFIX, execution_id)
}

pub fn summary_key(execution_id: u64) -> String {
    format!("{}:{}", SUMMARY_PREFIX, execution_id)
}

fn to_json<T: Serialize>(value: &T) -> RedisResult<String> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
    })
}

fn from_json<T: DeserializeOwned>(payload: &str) -> RedisResult<T> {
    serde_json::from_str(payload).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
    })
}

pub async fn connect(url: &str) -> RedisResult<ConnectionManager> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}

async fn set_with_ttl(
    conn: &mut ConnectionManager,
    key: &str,
    payload: String,
    ttl_seconds: u64,
) -> RedisResult<()> {
    redis::cmd("SET")
        .arg(key)
        .arg(payload)
        .arg("EX")
        .arg(ttl_seconds)
        .query_async::<_, ()>(conn)
        .await
}

/// Allocate a new run id and record its name.
pub async fn create_execution(
    conn: &mut ConnectionManager,
    name: &str,
    ttl_seconds: u64,
) -> RedisResult<u64> {
    let id: u64 = conn.incr(EXECUTION_SEQ_KEY, 1).await?;
    let entry = ExecutionEntry {
        id,
        name: name.to_string(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };
    set_with_ttl(conn, &execution_key(id), to_json(&entry)?, ttl_seconds).await?;
    let _: () = conn.rpush(EXECUTION_INDEX_KEY, id).await?;
    Ok(id)
}

/// Append one result to the run's ordered result list
pub async fn push_result(
    conn: &mut ConnectionManager,
    execution_id: u64,
    result: &TestResult,
    ttl_seconds: u64,
) -> RedisResult<()> {
    let key = results_key(execution_id);
    let _: () = conn.rpush(&key, to_json(result)?).await?;
    redis::cmd("EXPIRE")
        .arg(&key)
        .arg(ttl_seconds)
        .query_async::<_, ()>(conn)
        .await
}

pub async fn store_summary(
    conn: &mut ConnectionManager,
    execution_id: u64,
    summary: &ExecutionSummary,
    ttl_seconds: u64,
) -> RedisResult<()> {
    set_with_ttl(conn, &summary_key(execution_id), to_json(summary)?, ttl_seconds).await
}

pub async fn get_execution(
    conn: &mut ConnectionManager,
    execution_id: u64,
) -> RedisResult<Option<ExecutionEntry>> {
    let payload: Option<String> = conn.get(execution_key(execution_id)).await?;
    payload.as_deref().map(from_json).transpose()
}

pub async fn get_results(
    conn: &mut ConnectionManager,
    execution_id: u64,
) -> RedisResult<Vec<TestResult>> {
    let payloads: Vec<String> = conn.lrange(results_key(execution_id), 0, -1).await?;
    payloads.iter().map(|p| from_json(p)).collect()
}

pub async fn get_summary(
    conn: &mut ConnectionManager,
    execution_id: u64,
) -> RedisResult<Option<ExecutionSummary>> {
    let payload: Option<String> = conn.get(summary_key(execution_id)).await?;
    payload.as_deref().map(from_json).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, TestStatus};

    #[test]
    fn test_key_naming() {
        assert_eq!(execution_key(7), "restcheck:execution:7");
        assert_eq!(results_key(7), "restcheck:results:7");
        assert_eq!(summary_key(7), "restcheck:summary:7");
    }

    #[test]
    fn test_keys_deterministic() {
        assert_eq!(results_key(42), results_key(42));
        assert_ne!(results_key(42), results_key(43));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_round_trip_against_live_redis() {
        let mut conn = connect("redis://127.0.0.1:6379").await.expect("Failed to connect to Redis");

        let id = create_execution(&mut conn, "TestExecution_redis", 60).await.unwrap();
        let result = TestResult {
            id: "1".to_string(),
            name: "ping".to_string(),
            status: TestStatus::Passed,
            error: None,
            method: HttpMethod::Get,
            url: "http://localhost".to_string(),
            endpoint: "/ping".to_string(),
            expected_status_code: 200,
            actual_status_code: Some(200),
            duration_seconds: Some(0.01),
            response_size_bytes: Some(4),
        };
        push_result(&mut conn, id, &result, 60).await.unwrap();
        store_summary(&mut conn, id, &ExecutionSummary::from_results(&[result.clone()]), 60)
            .await
            .unwrap();

        let entry = get_execution(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(entry.name, "TestExecution_redis");
        assert_eq!(get_results(&mut conn, id).await.unwrap(), vec![result]);
        assert_eq!(get_summary(&mut conn, id).await.unwrap().unwrap().passed_tests, 1);
    }
}
