/// Executor - Run Orchestration
///
/// **Core Responsibility:**
/// Drive one run: allocate the execution id, process every test case in
/// declaration order, then aggregate and persist the summary.
///
/// **Per-case pipeline:**
/// SKIP → skipped result, no network call
/// RUN  → auth resolution → dispatch → evaluation → result
///
/// **Failure Handling:**
/// - No execution id → `RunError::ConfigurationFailure`, nothing runs
/// - Transport failure → that case is FAILED with the time spent waiting, the
///   run continues
/// - Persistence failure for a result or the summary → logged, the run continues
///
/// Run state lives in a `RunContext` owned by `execute_run`; nothing is shared
/// between runs.

use crate::auth;
use crate::engine::{DispatchRequest, HttpEngine};
use crate::evaluator::{self, FailureReporting};
use chrono::{DateTime, TimeZone};
use restcheck_common::store::{ResultStore, StoreError};
use restcheck_common::types::{
    ExecutionId, ExecutionSummary, RunFlag, TestCase, TestResult, TestStatus,
};
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, error, info, warn};

pub const SKIP_REASON: &str = "Test skipped (Run = N)";

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("could not allocate an execution id: {0}")]
    ConfigurationFailure(#[source] StoreError),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub execution_name: String,
    pub reporting: FailureReporting,
}

/// Everything produced by a completed run, in declaration order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: ExecutionId,
    pub execution_name: String,
    pub results: Vec<TestResult>,
    pub summary: ExecutionSummary,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.summary.failed_tests > 0
    }
}

/// Mutable state of a single run
struct RunContext {
    execution_id: ExecutionId,
    results: Vec<TestResult>,
}

impl RunContext {
    fn new(execution_id: ExecutionId, capacity: usize) -> Self {
        Self {
            execution_id,
            results: Vec::with_capacity(capacity),
        }
    }

    async fn record<S: ResultStore>(&mut self, store: &mut S, result: TestResult) {
        if let Err(e) = store.insert_result(&self.execution_id, &result).await {
            warn!(
                execution_id = %self.execution_id,
                test_id = %result.id,
                error = %e,
                "Failed to persist test result"
            );
        }
        self.results.push(result);
    }
}

/// `{prefix}_{YYYYmmdd_HHMMSS}`
pub fn execution_name<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("{}_{}", prefix, at.format("%Y%m%d_%H%M%S"))
}

fn base_result(case: &TestCase) -> TestResult {
    TestResult {
        id: case.id.clone(),
        name: case.name.clone(),
        status: TestStatus::Skipped,
        error: None,
        method: case.method,
        url: case.base_url.clone(),
        endpoint: case.endpoint.clone(),
        expected_status_code: case.expected_status_code,
        actual_status_code: None,
        duration_seconds: None,
        response_size_bytes: None,
    }
}

pub fn skipped_result(case: &TestCase) -> TestResult {
    TestResult {
        error: Some(SKIP_REASON.to_string()),
        ..base_result(case)
    }
}

/// Dispatch and evaluate one RUN case.
pub async fn run_case<E: HttpEngine>(
    case: &TestCase,
    engine: &E,
    reporting: FailureReporting,
) -> TestResult {
    let resolved = auth::resolve(case);
    let request = DispatchRequest {
        method: case.method,
        base_url: &case.base_url,
        endpoint: &case.endpoint,
        headers: &resolved.headers,
        body: case.body.as_ref(),
        credential: resolved.credential.as_ref(),
    };

    match engine.dispatch(&request).await {
        Ok(dispatched) => {
            let verdict = evaluator::evaluate_response(&dispatched.response, case, reporting);
            TestResult {
                status: verdict.status,
                error: verdict.error,
                actual_status_code: Some(dispatched.response.status),
                duration_seconds: Some(dispatched.duration_seconds),
                response_size_bytes: Some(dispatched.size_bytes),
                ..base_result(case)
            }
        }
        Err(failure) => {
            warn!(
                test_id = %case.id,
                url = %request.url(),
                duration_ms = (failure.duration_seconds * 1000.0) as u64,
                error = %failure,
                "Transport failure"
            );
            TestResult {
                status: TestStatus::Failed,
                error: Some(failure.to_string()),
                duration_seconds: Some(failure.duration_seconds),
                response_size_bytes: Some(0),
                ..base_result(case)
            }
        }
    }
}

/// Execute a full run against `engine`, persisting through `store`.
pub async fn execute_run<E, S>(
    cases: &[TestCase],
    engine: &E,
    store: &mut S,
    options: &RunOptions,
) -> Result<RunReport, RunError>
where
    E: HttpEngine,
    S: ResultStore,
{
    let execution_id = store
        .create_execution(&options.execution_name)
        .await
        .map_err(|e| {
            error!(name = %options.execution_name, error = %e, "Failed to create execution");
            RunError::ConfigurationFailure(e)
        })?;

    info!(
        execution_id = %execution_id,
        name = %options.execution_name,
        test_cases = cases.len(),
        "Execution started"
    );

    let mut ctx = RunContext::new(execution_id, cases.len());

    for case in cases {
        let result = match case.run {
            RunFlag::Skip => {
                debug!(execution_id = %ctx.execution_id, test_id = %case.id, "Skipping test case");
                skipped_result(case)
            }
            RunFlag::Run => run_case(case, engine, options.reporting).await,
        };

        info!(
            execution_id = %ctx.execution_id,
            test_id = %result.id,
            status = %result.status,
            duration_ms = result.duration_seconds.map(|s| (s * 1000.0) as u64),
            "Test case finished"
        );
        if let Some(error) = &result.error {
            debug!(test_id = %result.id, error = %error, "Test case diagnostic");
        }

        ctx.record(store, result).await;
    }

    let summary = ExecutionSummary::from_results(&ctx.results);
    if let Err(e) = store.insert_summary(&ctx.execution_id, &summary).await {
        error!(execution_id = %ctx.execution_id, error = %e, "Failed to persist summary");
    }

    info!(
        execution_id = %ctx.execution_id,
        total = summary.total_tests,
        passed = summary.passed_tests,
        failed = summary.failed_tests,
        skipped = summary.skipped_tests,
        "Execution completed"
    );

    Ok(RunReport {
        execution_id: ctx.execution_id,
        execution_name: options.execution_name.clone(),
        results: ctx.results,
        summary,
    })
}
