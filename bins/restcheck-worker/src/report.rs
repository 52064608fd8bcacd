// Run report output: console summary, optional JSON file and the annotated suite copy

use crate::executor::RunReport;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone};
use restcheck_common::suite;
use restcheck_common::types::{format_duration, TestResult, TestStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Display, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Human-readable summary printed after every run
pub fn render_summary(report: &RunReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Execution {} ({})", report.execution_name, report.execution_id);
    for result in &report.results {
        let _ = write!(
            out,
            "  [{:<7}] {} {} {}{}",
            result.status, result.id, result.method, result.url, result.endpoint
        );
        match (&result.status, &result.error) {
            (TestStatus::Failed, Some(error)) => {
                let _ = writeln!(out, " - {error}");
            }
            _ => out.push('\n'),
        }
    }
    let _ = writeln!(
        out,
        "Total: {}  Passed: {}  Failed: {}  Skipped: {}",
        summary.total_tests, summary.passed_tests, summary.failed_tests, summary.skipped_tests
    );
    let _ = writeln!(
        out,
        "Pass rate: {:.1}%  Avg duration: {}  Total response size: {} bytes",
        summary.pass_rate() * 100.0,
        format_duration(summary.avg_duration_seconds),
        summary.total_response_size_bytes
    );
    out
}

pub fn write_json_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(execution_id = %report.execution_id, path = %path.display(), "Run report written");
    Ok(())
}

/// Write each result's status and error onto the suite record with the same id.
///
/// Records using the spreadsheet columns (`TestId`) get `Status`/`Error`, the
/// others `status`/`error`. The error is only kept for FAILED results. Returns
/// the number of records updated.
pub fn annotate_records(document: &mut Value, results: &[TestResult]) -> usize {
    let records = match document {
        Value::Array(records) => records,
        Value::Object(object) => match object.get_mut("test_cases") {
            Some(Value::Array(records)) => records,
            _ => return 0,
        },
        _ => return 0,
    };
    let by_id: HashMap<&str, &TestResult> = results.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut updated = 0;
    for record in records.iter_mut() {
        let Value::Object(fields) = record else { continue };
        let Some(result) = suite::record_id(fields).and_then(|id| by_id.get(id.as_str()).copied())
        else {
            continue;
        };

        let (status_key, error_key) = if fields.contains_key("TestId") {
            ("Status", "Error")
        } else {
            ("status", "error")
        };
        let error = match (result.status, &result.error) {
            (TestStatus::Failed, Some(error)) => Value::String(error.clone()),
            _ => Value::Null,
        };
        fields.insert(status_key.to_string(), Value::String(result.status.to_string()));
        fields.insert(error_key.to_string(), error);
        updated += 1;
    }
    updated
}

/// `{dir}/{stem}_{YYYYmmdd_HHMMSS}.json` next to the suite
pub fn annotated_path<Tz: TimeZone>(suite_path: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: Display,
{
    let stem = suite_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "suite".to_string());
    suite_path.with_file_name(format!("{}_{}.json", stem, at.format("%Y%m%d_%H%M%S")))
}

/// Save a copy of the suite with every executed record's outcome filled in.
/// The source suite is left untouched.
pub fn annotate_suite<Tz: TimeZone>(
    suite_path: &Path,
    results: &[TestResult],
    at: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: Display,
{
    if results.is_empty() {
        bail!("No results to write back");
    }
    let raw = fs::read_to_string(suite_path)
        .with_context(|| format!("Failed to read {}", suite_path.display()))?;
    let mut document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", suite_path.display()))?;

    let updated = annotate_records(&mut document, results);
    if updated < results.len() {
        warn!(
            suite = %suite_path.display(),
            updated,
            results = results.len(),
            "Some results had no matching suite record"
        );
    }

    let target = annotated_path(suite_path, at);
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize suite")?;
    fs::write(&target, json).with_context(|| format!("Failed to write {}", target.display()))?;

    info!(suite = %suite_path.display(), path = %target.display(), updated, "Suite results written back");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_common::types::{ExecutionId, ExecutionSummary, HttpMethod, TestResult};

    fn make_report() -> RunReport {
        let results = vec![
            TestResult {
                id: "1".to_string(),
                name: "health".to_string(),
                status: TestStatus::Passed,
                error: None,
                method: HttpMethod::Get,
                url: "http://api.test".to_string(),
                endpoint: "/health".to_string(),
                expected_status_code: 200,
                actual_status_code: Some(200),
                duration_seconds: Some(1.5),
                response_size_bytes: Some(20),
            },
            TestResult {
                id: "2".to_string(),
                name: "create".to_string(),
                status: TestStatus::Failed,
                error: Some("Expected status code: 201, Got: 400".to_string()),
                method: HttpMethod::Post,
                url: "http://api.test".to_string(),
                endpoint: "/users".to_string(),
                expected_status_code: 201,
                actual_status_code: Some(400),
                duration_seconds: Some(0.5),
                response_size_bytes: Some(10),
            },
        ];
        let summary = ExecutionSummary::from_results(&results);
        RunReport {
            execution_id: ExecutionId("9".to_string()),
            execution_name: "TestExecution_20240101_000000".to_string(),
            results,
            summary,
        }
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&make_report());

        assert!(text.starts_with("Execution TestExecution_20240101_000000 (9)\n"));
        assert!(text.contains("[PASSED ] 1 GET http://api.test/health\n"));
        assert!(text.contains("[FAILED ] 2 POST http://api.test/users - Expected status code: 201, Got: 400\n"));
        assert!(text.contains("Total: 2  Passed: 1  Failed: 1  Skipped: 0"));
        assert!(text.contains("Pass rate: 50.0%  Avg duration: 1 sec 0 ms  Total response size: 30 bytes"));
    }

    #[test]
    fn test_annotate_records_matches_by_id() {
        let report = make_report();
        let mut document = serde_json::json!([
            {"TestId": 2, "TestCase": "create", "Status": "", "Error": "stale"},
            {"id": "1", "name": "health"},
            {"id": "3", "name": "untouched"}
        ]);

        let updated = annotate_records(&mut document, &report.results);

        assert_eq!(updated, 2);
        assert_eq!(document[0]["Status"], "FAILED");
        assert_eq!(document[0]["Error"], "Expected status code: 201, Got: 400");
        assert_eq!(document[0]["TestCase"], "create");
        assert_eq!(document[1]["status"], "PASSED");
        assert_eq!(document[1]["error"], serde_json::Value::Null);
        assert!(document[2].get("status").is_none());
    }

    #[test]
    fn test_annotate_suite_writes_timestamped_copy() {
        let dir = std::env::temp_dir().join(format!("restcheck-annotate-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let suite_path = dir.join("api_tests.json");
        let original = r#"{"test_cases": [{"id": "2", "name": "create"}]}"#;
        fs::write(&suite_path, original).unwrap();
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let target = annotate_suite(&suite_path, &make_report().results, &at).unwrap();

        assert_eq!(target, dir.join("api_tests_20240102_030405.json"));
        let copy: serde_json::Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(copy["test_cases"][0]["status"], "FAILED");
        assert_eq!(fs::read_to_string(&suite_path).unwrap(), original);
        assert!(annotate_suite(&suite_path, &[], &at).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_json_report() {
        let dir = std::env::temp_dir().join(format!("restcheck-report-{}", std::process::id()));
        let path = dir.join("run.json");

        write_json_report(&make_report(), &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["execution_id"], "9");
        assert_eq!(value["results"][1]["status"], "FAILED");
        assert_eq!(value["summary"]["total_tests"], 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
