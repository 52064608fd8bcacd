// CLI commands for restcheck projects and recorded runs
use anyhow::{bail, Context, Result};
use restcheck_common::redis as redis_store;
use restcheck_common::sqlite::{self, ExecutionRecord};
use restcheck_common::suite::{self, LoadedSuite};
use restcheck_common::types::{format_duration, ExecutionSummary, RunFlag, TestResult, TestStatus};
use rusqlite::Connection;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const RUNNER_TEMPLATE: &str = include_str!("../../../config/runner.json");
const SUITE_TEMPLATE: &str = include_str!("../../../suites/api_tests.json");

/// Scaffold config/runner.json, a sample suite and the reports directory
pub async fn init_project(path: &Path) -> Result<()> {
    println!("🚀 Initializing restcheck project at: {}", path.display());

    for dir in ["config", "suites", "reports"] {
        fs::create_dir_all(path.join(dir))
            .with_context(|| format!("Failed to create directory: {}", dir))?;
        println!("  ✅ Created: {}", dir);
    }

    for (relative, content) in [
        ("config/runner.json", RUNNER_TEMPLATE),
        ("suites/api_tests.json", SUITE_TEMPLATE),
    ] {
        let target = path.join(relative);
        if target.exists() {
            println!("  ⏭️  Kept existing: {}", relative);
            continue;
        }
        fs::write(&target, content).with_context(|| format!("Failed to write {}", relative))?;
        println!("  ✅ Created: {}", relative);
    }

    println!("✅ Project initialized successfully!");
    println!("\n📋 Next steps:");
    println!("  1. Describe your API tests in suites/api_tests.json");
    println!("  2. Check them: restcheck-cli validate --suite suites/api_tests.json");
    println!("  3. Run them: restcheck-worker");

    Ok(())
}

pub fn render_validation(loaded: &LoadedSuite) -> String {
    let mut out = String::new();
    let runnable = loaded
        .cases
        .iter()
        .filter(|c| c.run == RunFlag::Run)
        .count();

    let _ = writeln!(
        out,
        "✅ Accepted: {} test case(s) ({} to run, {} skipped)",
        loaded.cases.len(),
        runnable,
        loaded.cases.len() - runnable
    );
    if !loaded.rejected.is_empty() {
        let _ = writeln!(out, "❌ Rejected: {} record(s)", loaded.rejected.len());
        for rejected in &loaded.rejected {
            let _ = writeln!(out, "  - record {}: {}", rejected.index, rejected.reason);
        }
    }
    out
}

/// Load a suite and report accepted and rejected records
pub async fn validate_suite(path: &Path) -> Result<()> {
    let loaded = suite::load_suite(path)
        .with_context(|| format!("Failed to load suite {}", path.display()))?;

    println!("📋 Suite: {}\n", path.display());
    print!("{}", render_validation(&loaded));

    if !loaded.rejected.is_empty() {
        bail!("{} record(s) failed validation", loaded.rejected.len());
    }
    Ok(())
}

fn open_existing(db: &Path) -> Result<Connection> {
    if !db.exists() {
        bail!("Results database not found: {}", db.display());
    }
    sqlite::open(db).with_context(|| format!("Failed to open {}", db.display()))
}

pub fn render_executions(executions: &[ExecutionRecord]) -> String {
    let mut out = String::new();
    if executions.is_empty() {
        out.push_str("No executions recorded.\n");
        return out;
    }

    let _ = writeln!(out, "{:<6} {:<36} {:<20}", "Id", "Name", "Date");
    let _ = writeln!(out, "{}", "─".repeat(64));
    for execution in executions {
        let _ = writeln!(out, "{:<6} {:<36} {:<20}", execution.id, execution.name, execution.date);
    }
    let _ = writeln!(out, "\n✅ Total: {} execution(s)", executions.len());
    out
}

/// List recorded executions, most recent first
pub async fn list_executions(db: &Path, json: bool) -> Result<()> {
    let conn = open_existing(db)?;
    let executions = sqlite::list_executions(&conn).context("Failed to read executions")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
    } else {
        print!("{}", render_executions(&executions));
    }
    Ok(())
}

pub fn render_execution(
    name: &str,
    summary: Option<&ExecutionSummary>,
    results: &[TestResult],
    failed_only: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 {}\n", name);

    let shown = results
        .iter()
        .filter(|r| !failed_only || r.status == TestStatus::Failed);
    for result in shown {
        let duration = result
            .duration_seconds
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "[{:<7}] {:<8} {:<7} {}{}  ({})",
            result.status, result.id, result.method, result.url, result.endpoint, duration
        );
        if let Some(error) = &result.error {
            if result.status == TestStatus::Failed {
                let _ = writeln!(out, "          {}", error);
            }
        }
    }

    match summary {
        Some(summary) => {
            let _ = writeln!(
                out,
                "\nTotal: {}  Passed: {}  Failed: {}  Skipped: {}  Avg: {}  Size: {} bytes",
                summary.total_tests,
                summary.passed_tests,
                summary.failed_tests,
                summary.skipped_tests,
                format_duration(summary.avg_duration_seconds),
                summary.total_response_size_bytes
            );
        }
        None => out.push_str("\n⚠️  No summary recorded for this execution\n"),
    }
    out
}

/// Print every result of one execution
pub async fn show_execution(db: &Path, execution_id: i64, failed_only: bool) -> Result<()> {
    let conn = open_existing(db)?;
    let Some(name) = sqlite::execution_name(&conn, execution_id)? else {
        bail!("Execution {} not found", execution_id);
    };
    let total = sqlite::count_results(&conn, Some(execution_id))?;
    let page_size = u32::try_from(total).context("Too many results to display")?;
    let results: Vec<TestResult> = sqlite::fetch_results(&conn, Some(execution_id), 0, page_size)?
        .into_iter()
        .map(|stored| stored.result)
        .collect();
    let summary = sqlite::fetch_summary(&conn, execution_id)?;

    print!("{}", render_execution(&name, summary.as_ref(), &results, failed_only));
    Ok(())
}

/// Print every result of one execution kept in Redis
pub async fn show_redis_execution(url: &str, execution_id: i64, failed_only: bool) -> Result<()> {
    let id = u64::try_from(execution_id).context("Execution ids are positive")?;
    let mut conn = redis_store::connect(url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", url))?;

    let Some(entry) = redis_store::get_execution(&mut conn, id).await? else {
        bail!("Execution {} not found (it may have expired)", execution_id);
    };
    let results = redis_store::get_results(&mut conn, id).await?;
    let summary = redis_store::get_summary(&mut conn, id).await?;

    print!("{}", render_execution(&entry.name, summary.as_ref(), &results, failed_only));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_common::types::HttpMethod;

    fn make_result(id: &str, status: TestStatus, error: Option<&str>) -> TestResult {
        TestResult {
            id: id.to_string(),
            name: format!("case {id}"),
            status,
            error: error.map(str::to_string),
            method: HttpMethod::Get,
            url: "http://api.test".to_string(),
            endpoint: "/items".to_string(),
            expected_status_code: 200,
            actual_status_code: None,
            duration_seconds: Some(0.25),
            response_size_bytes: None,
        }
    }

    #[test]
    fn test_sample_suite_is_valid() {
        let loaded = suite::parse_suite(SUITE_TEMPLATE).unwrap();

        assert_eq!(loaded.cases.len(), 3);
        assert!(loaded.rejected.is_empty(), "{:?}", loaded.rejected);
        assert!(render_validation(&loaded).contains("Accepted: 3 test case(s) (2 to run, 1 skipped)"));
    }

    #[test]
    fn test_validation_lists_rejections() {
        let loaded = suite::parse_suite(
            r#"[{"id": "1", "name": "a", "run": "maybe", "method": "GET",
                 "base_url": "http://h", "endpoint": "/", "expected_status_code": 200}]"#,
        )
        .unwrap();

        let text = render_validation(&loaded);

        assert!(text.contains("Rejected: 1 record(s)"));
        assert!(text.contains("record 0: unknown run flag `maybe`"));
    }

    #[test]
    fn test_render_execution_failed_only() {
        let results = vec![
            make_result("1", TestStatus::Passed, None),
            make_result("2", TestStatus::Failed, Some("Expected status code: 200, Got: 500")),
        ];

        let all = render_execution("nightly", None, &results, false);
        let failed = render_execution("nightly", None, &results, true);

        assert!(all.contains("[PASSED ] 1"));
        assert!(!failed.contains("[PASSED ]"));
        assert!(failed.contains("[FAILED ] 2        GET     http://api.test/items  (0 sec 250 ms)"));
        assert!(failed.contains("Expected status code: 200, Got: 500"));
        assert!(failed.contains("No summary recorded"));
    }

    #[test]
    fn test_render_executions() {
        assert_eq!(render_executions(&[]), "No executions recorded.\n");

        let text = render_executions(&[ExecutionRecord {
            id: 3,
            name: "TestExecution_20240101_000000".to_string(),
            date: "2024-01-01 00:00:00".to_string(),
        }]);
        assert!(text.contains("TestExecution_20240101_000000"));
        assert!(text.contains("Total: 1 execution(s)"));
    }

    #[tokio::test]
    async fn test_init_scaffolds_project() {
        let dir = std::env::temp_dir().join(format!("restcheck-init-{}", uuid::Uuid::new_v4()));

        init_project(&dir).await.unwrap();

        assert!(dir.join("reports").is_dir());
        let config = fs::read_to_string(dir.join("config/runner.json")).unwrap();
        assert_eq!(config, RUNNER_TEMPLATE);
        assert!(dir.join("suites/api_tests.json").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_show_execution_reads_database() {
        let db = std::env::temp_dir().join(format!("restcheck-show-{}.db", uuid::Uuid::new_v4()));
        let id = {
            let conn = sqlite::open(&db).unwrap();
            let id = sqlite::insert_execution(&conn, "nightly").unwrap();
            let result = make_result("1", TestStatus::Failed, Some("Request failed: refused"));
            sqlite::insert_result(&conn, id, &result).unwrap();
            id
        };

        assert!(show_execution(&db, id, true).await.is_ok());
        assert!(show_execution(&db, id + 1, false).await.is_err());
        assert!(list_executions(&db, true).await.is_ok());

        let _ = fs::remove_file(&db);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_show_execution_reads_redis() {
        let url = "redis://127.0.0.1:6379";
        let mut conn = redis_store::connect(url).await.expect("Failed to connect to Redis");
        let id = redis_store::create_execution(&mut conn, "nightly", 60).await.unwrap();
        let result = make_result("1", TestStatus::Failed, Some("Request failed: refused"));
        redis_store::push_result(&mut conn, id, &result, 60).await.unwrap();
        redis_store::store_summary(&mut conn, id, &ExecutionSummary::from_results(&[result]), 60)
            .await
            .unwrap();

        let execution_id = i64::try_from(id).unwrap();
        assert!(show_redis_execution(url, execution_id, true).await.is_ok());
        assert!(show_redis_execution(url, -1, false).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_database_is_an_error() {
        let db = std::env::temp_dir().join(format!("restcheck-missing-{}.db", uuid::Uuid::new_v4()));
        assert!(list_executions(&db, false).await.is_err());
    }
}
