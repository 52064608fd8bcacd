/// Response Evaluator - Verdict Logic
///
/// **Core Responsibility:**
/// Compare a raw HTTP response against a test case's expectations and assign
/// a verdict plus diagnostic message.
///
/// **Critical Properties:**
/// - Knows nothing about reqwest
/// - Knows nothing about persistence
/// - Pure function: (response, test case) → (status, message)
///
/// **Check Order:**
/// 1. Status code
/// 2. Response body against the expected value (only when one is declared)
/// 3. Body parse failure (JSON content type with a malformed body)
///
/// Each failing check produces a finding. In the default `LastWins` mode only
/// the last finding is reported, so a parse failure hides a status mismatch
/// and a body mismatch hides a status mismatch. `AllChecks` reports every
/// finding joined with `; `.
///
/// **Comparison Rules:**
/// - JSON bodies: deep structural equality, arrays ordered, objects by key set,
///   numbers by value (`1 == 1.0`)
/// - Text bodies: exact string equality against a string expectation

use crate::engine::HttpResponse;
use restcheck_common::types::{TestCase, TestStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReporting {
    /// Only the last failing check's message is kept
    #[default]
    LastWins,
    /// Every failing check's message is reported
    AllChecks,
}

/// Response body after content-type based interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// One failed check
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    StatusMismatch { expected: u16, actual: u16 },
    BodyMismatch { expected: Value, actual: ResponseBody },
    ParseFailure(String),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::StatusMismatch { expected, actual } => {
                write!(f, "Expected status code: {expected}, Got: {actual}")
            }
            Finding::BodyMismatch { expected, actual } => {
                let actual = match actual {
                    ResponseBody::Json(value) => render_value(value),
                    ResponseBody::Text(text) => text.clone(),
                };
                write!(f, "Expected response: {}, Got: {}", render_value(expected), actual)
            }
            Finding::ParseFailure(error) => write!(f, "Failed to parse response: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: TestStatus,
    pub error: Option<String>,
    pub findings: Vec<Finding>,
}

impl Verdict {
    fn from_findings(findings: Vec<Finding>, reporting: FailureReporting) -> Self {
        let error = match reporting {
            FailureReporting::LastWins => findings.last().map(ToString::to_string),
            FailureReporting::AllChecks if findings.is_empty() => None,
            FailureReporting::AllChecks => Some(
                findings
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        };
        let status = if findings.is_empty() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };
        Verdict {
            status,
            error,
            findings,
        }
    }
}

/// JSON is recognised by an `application/json` media type or a `+json` suffix
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

pub fn parse_body(response: &HttpResponse) -> Result<ResponseBody, serde_json::Error> {
    if is_json_content_type(response.content_type.as_deref()) {
        serde_json::from_str(&response.body).map(ResponseBody::Json)
    } else {
        Ok(ResponseBody::Text(response.body.clone()))
    }
}

/// Deep equality where numbers compare by value
pub fn structurally_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| structurally_equal(x, y)))
        }
        _ => expected == actual,
    }
}

fn body_matches(expected: &Value, actual: &ResponseBody) -> bool {
    match actual {
        ResponseBody::Json(value) => structurally_equal(expected, value),
        ResponseBody::Text(text) => matches!(expected, Value::String(s) if s == text),
    }
}

/// Classify one response against its test case.
pub fn evaluate_response(
    response: &HttpResponse,
    test_case: &TestCase,
    reporting: FailureReporting,
) -> Verdict {
    let mut findings = Vec::new();

    if response.status != test_case.expected_status_code {
        findings.push(Finding::StatusMismatch {
            expected: test_case.expected_status_code,
            actual: response.status,
        });
    }

    match parse_body(response) {
        Ok(body) => {
            if let Some(expected) = &test_case.expected_response {
                if !body_matches(expected, &body) {
                    findings.push(Finding::BodyMismatch {
                        expected: expected.clone(),
                        actual: body,
                    });
                }
            }
        }
        Err(e) => findings.push(Finding::ParseFailure(e.to_string())),
    }

    Verdict::from_findings(findings, reporting)
}

/// Render a value for a diagnostic message.
///
/// Top-level strings are shown bare; everything else uses the literal
/// notation of the result reports, e.g. `{'ok': True, 'items': [1, None]}`.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            write_literal(other, &mut out);
            out
        }
    }
}

fn write_literal(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_quoted(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_quoted(key, out);
                out.push_str(": ");
                write_literal(item, out);
            }
            out.push('}');
        }
    }
}

// single quotes unless the text holds a single quote and no double quote
fn write_quoted(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}
