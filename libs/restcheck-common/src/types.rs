use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or declared enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "HTTP method",
                value: s.to_string(),
            })
    }
}

/// Whether a declared test case takes part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunFlag {
    Run,
    Skip,
}

/// One declared API test, as produced by the suite loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub run: RunFlag,
    pub method: HttpMethod,
    pub base_url: String,
    pub endpoint: String,
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub basic_auth_user: Option<String>,
    #[serde(default)]
    pub basic_auth_password: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<Value>,
    pub expected_status_code: u16,
    /// `None` disables the response body check.
    #[serde(default)]
    pub expected_response: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASSED" => Ok(TestStatus::Passed),
            "FAILED" => Ok(TestStatus::Failed),
            "SKIPPED" => Ok(TestStatus::Skipped),
            other => Err(ParseEnumError {
                kind: "test status",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of one executed or skipped test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    pub error: Option<String>,
    pub method: HttpMethod,
    pub url: String,
    pub endpoint: String,
    pub expected_status_code: u16,
    pub actual_status_code: Option<u16>,
    pub duration_seconds: Option<f64>,
    pub response_size_bytes: Option<u64>,
}

/// Aggregate over one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub avg_duration_seconds: f64,
    pub total_response_size_bytes: u64,
}

impl ExecutionSummary {
    /// Build the summary for a finished run.
    ///
    /// The average duration only covers cases that were not skipped; a skipped
    /// case adds nothing to the total response size.
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = ExecutionSummary {
            total_tests: results.len() as u64,
            ..Default::default()
        };
        let mut duration_sum = 0.0;
        let mut executed = 0u64;

        for result in results {
            match result.status {
                TestStatus::Passed => summary.passed_tests += 1,
                TestStatus::Failed => summary.failed_tests += 1,
                TestStatus::Skipped => summary.skipped_tests += 1,
            }
            if result.status != TestStatus::Skipped {
                executed += 1;
                duration_sum += result.duration_seconds.unwrap_or(0.0);
            }
            summary.total_response_size_bytes += result.response_size_bytes.unwrap_or(0);
        }

        if executed > 0 {
            summary.avg_duration_seconds = duration_sum / executed as f64;
        }
        summary
    }

    pub fn pass_rate(&self) -> f64 {
        let executed = self.total_tests - self.skipped_tests;
        if executed == 0 {
            return 0.0;
        }
        self.passed_tests as f64 / executed as f64
    }
}

/// Opaque run identifier handed out by a result store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a duration the way the results dashboard shows it, e.g. `2 sec 500 ms`.
pub fn format_duration(seconds: f64) -> String {
    if seconds > 0.0 {
        let whole = seconds.trunc() as u64;
        let millis = ((seconds - seconds.trunc()) * 1000.0) as u64;
        format!("{whole} sec {millis} ms")
    } else {
        "0 sec 0 ms".to_string()
    }
}
