//! Test suite loading.
//!
//! A suite is a JSON file holding test case records, either as a top-level
//! array or under a `test_cases` key. Records may use the spreadsheet column
//! names (`TestId`, `URL`, `ExpectedStatusCode`, ...) and may carry headers,
//! bodies and expected responses as JSON-encoded strings, the way spreadsheet
//! cells hold them. Every record is normalised and validated on its own; a bad
//! record is rejected and reported, it never stops the rest of the suite from
//! loading.

use crate::types::TestCase;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to read suite `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("suite is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("suite must be an array of test cases or an object with a `test_cases` array")]
    Shape,
}

/// A record that did not make it into the execution set.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedSuite {
    pub cases: Vec<TestCase>,
    pub rejected: Vec<RejectedRecord>,
}

/// Field aliases: spreadsheet columns and camelCase names onto the model's names.
const ALIASES: &[(&str, &str)] = &[
    ("TestId", "id"),
    ("TestCase", "name"),
    ("Run", "run"),
    ("runFlag", "run"),
    ("Method", "method"),
    ("URL", "base_url"),
    ("baseUrl", "base_url"),
    ("Endpoint", "endpoint"),
    ("Authorization", "authorization"),
    ("authorizationHeader", "authorization"),
    ("User", "basic_auth_user"),
    ("basicAuthUser", "basic_auth_user"),
    ("Password", "basic_auth_password"),
    ("basicAuthPassword", "basic_auth_password"),
    ("Headers", "headers"),
    ("Body", "body"),
    ("ExpectedStatusCode", "expected_status_code"),
    ("expectedStatusCode", "expected_status_code"),
    ("ExpectedResponse", "expected_response"),
    ("expectedResponse", "expected_response"),
];

const OPTIONAL_TEXT_FIELDS: &[&str] = &["authorization", "basic_auth_user", "basic_auth_password"];

pub fn load_suite(path: &Path) -> Result<LoadedSuite, SuiteError> {
    let raw = fs::read_to_string(path).map_err(|source| SuiteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let suite = parse_suite(&raw)?;
    info!(
        path = %path.display(),
        accepted = suite.cases.len(),
        rejected = suite.rejected.len(),
        "Test suite loaded"
    );
    Ok(suite)
}

pub fn parse_suite(raw: &str) -> Result<LoadedSuite, SuiteError> {
    let document: Value = serde_json::from_str(raw)?;
    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("test_cases") {
            Some(Value::Array(records)) => records,
            _ => return Err(SuiteError::Shape),
        },
        _ => return Err(SuiteError::Shape),
    };

    let mut suite = LoadedSuite::default();
    let mut seen_ids = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let outcome = validate_record(record).and_then(|case| {
            if seen_ids.insert(case.id.clone()) {
                Ok(case)
            } else {
                Err(format!("duplicate test id `{}`", case.id))
            }
        });
        match outcome {
            Ok(case) => suite.cases.push(case),
            Err(reason) => {
                warn!(record = index, reason = %reason, "Rejected test case record");
                suite.rejected.push(RejectedRecord { index, reason });
            }
        }
    }

    Ok(suite)
}

/// Normalise one raw record and check it has the shape of a [`TestCase`].
pub fn validate_record(record: Value) -> Result<TestCase, String> {
    let Value::Object(fields) = record else {
        return Err("record is not an object".to_string());
    };
    let normalized = normalize_record(fields)?;
    let case: TestCase = serde_json::from_value(Value::Object(normalized)).map_err(|e| e.to_string())?;

    if case.id.trim().is_empty() {
        return Err("`id` must not be empty".to_string());
    }
    if case.base_url.trim().is_empty() {
        return Err("`base_url` must not be empty".to_string());
    }
    Ok(case)
}

fn normalize_record(fields: Map<String, Value>) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();
    for (key, value) in fields {
        let key = ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(key);
        out.insert(key, value);
    }

    if let Some(Value::Number(n)) = out.get("id") {
        let id = integral(n).map(|i| i.to_string()).unwrap_or_else(|| n.to_string());
        out.insert("id".to_string(), Value::String(id));
    }

    if let Some(run) = out.get_mut("run") {
        *run = Value::String(normalize_run_flag(run)?.to_string());
    }

    if let Some(Value::String(method)) = out.get_mut("method") {
        *method = method.trim().to_uppercase();
    }

    for field in OPTIONAL_TEXT_FIELDS {
        if matches!(out.get(*field), Some(Value::String(s)) if s.is_empty()) {
            out.insert(field.to_string(), Value::Null);
        }
    }

    if let Some(headers) = out.remove("headers") {
        out.insert("headers".to_string(), normalize_headers(headers)?);
    }
    for field in ["body", "expected_response"] {
        if let Some(value) = out.remove(field) {
            out.insert(field.to_string(), decode_cell(value));
        }
    }

    if let Some(code) = out.get_mut("expected_status_code") {
        *code = normalize_status_code(code)?;
    }

    Ok(out)
}

/// The id of a raw record under either spelling, normalised the way loading does.
pub fn record_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("id").or_else(|| record.get("TestId"))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(integral(n).map(|i| i.to_string()).unwrap_or_else(|| n.to_string())),
        _ => None,
    }
}

fn integral(n: &serde_json::Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn normalize_run_flag(value: &Value) -> Result<&'static str, String> {
    match value {
        Value::Bool(true) => Ok("RUN"),
        Value::Bool(false) => Ok("SKIP"),
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" | "RUN" => Ok("RUN"),
            "N" | "NO" | "SKIP" => Ok("SKIP"),
            _ => Err(format!("unknown run flag `{s}`")),
        },
        other => Err(format!("unknown run flag `{other}`")),
    }
}

fn normalize_status_code(value: &Value) -> Result<Value, String> {
    let code = match value {
        Value::Number(n) => integral(n),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    code.filter(|c| (100..=999).contains(c))
        .map(Value::from)
        .ok_or_else(|| format!("invalid expected status code `{value}`"))
}

/// Headers must end up as a flat string map; scalar values are stringified.
fn normalize_headers(value: Value) -> Result<Value, String> {
    let value = match value {
        Value::String(s) if s.trim().is_empty() => return Ok(Value::Null),
        Value::String(s) => serde_json::from_str(&s).map_err(|e| format!("`headers` is not valid JSON: {e}"))?,
        other => other,
    };
    match value {
        Value::Null => Ok(Value::Null),
        Value::Object(map) => {
            let mut headers = Map::new();
            for (name, value) in map {
                let value = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => return Err(format!("header `{name}` has non-scalar value `{other}`")),
                };
                headers.insert(name, Value::String(value));
            }
            Ok(Value::Object(headers))
        }
        other => Err(format!("`headers` must be an object, got `{other}`")),
    }
}

/// A string cell holding JSON is decoded; an empty cell means absent and any
/// other string is kept as a plain string value.
fn decode_cell(value: Value) -> Value {
    match value {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}
