//! # Response Validation
//!
//! Declarative assertions evaluated against a captured HTTP response:
//! status code, response time, dot-path lookups into a JSON body, and
//! header comparisons.
//!
//! `evaluate` is a stateless batch evaluator: one result per rule, input
//! order preserved, and a malformed rule produces a failed result with a
//! message instead of aborting the batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::http::response::CapturedResponse;

/// Part of the response a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Status,
    Time,
    JsonPath,
    Header,
}

impl RuleKind {
    fn label(self) -> &'static str {
        match self {
            RuleKind::Status => "status",
            RuleKind::Time => "time",
            RuleKind::JsonPath => "json_path",
            RuleKind::Header => "header",
        }
    }
}

/// Comparison applied between the resolved actual value and the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    Contains,
    Exists,
}

impl RuleOperator {
    fn label(self) -> &'static str {
        match self {
            RuleOperator::Equal => "equal",
            RuleOperator::NotEqual => "not_equal",
            RuleOperator::LessThan => "less_than",
            RuleOperator::GreaterThan => "greater_than",
            RuleOperator::LessOrEqual => "less_or_equal",
            RuleOperator::GreaterOrEqual => "greater_or_equal",
            RuleOperator::Contains => "contains",
            RuleOperator::Exists => "exists",
        }
    }
}

/// Error raised when a rule is built from inconsistent parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("operator `exists` is not valid for `{0}` rules")]
    ExistsNotApplicable(&'static str),
    #[error("`{0}` rules require a field")]
    MissingField(&'static str),
}

/// A single declarative assertion about a captured response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub kind: RuleKind,
    /// Dot-delimited body path for `json_path`, header name for `header`;
    /// unused for `status` and `time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub operator: RuleOperator,
    #[serde(default)]
    pub expected: Value,
}

impl ValidationRule {
    /// Build a rule, rejecting combinations with no defined meaning:
    /// `exists` on `status`/`time`, and a missing field where one is needed.
    pub fn new(
        kind: RuleKind,
        field: Option<String>,
        operator: RuleOperator,
        expected: Value,
    ) -> Result<Self, RuleError> {
        match kind {
            RuleKind::Status | RuleKind::Time => {
                if operator == RuleOperator::Exists {
                    return Err(RuleError::ExistsNotApplicable(kind.label()));
                }
            }
            RuleKind::JsonPath | RuleKind::Header => {
                if field.as_deref().map_or(true, |f| f.trim().is_empty()) {
                    return Err(RuleError::MissingField(kind.label()));
                }
            }
        }

        Ok(Self {
            kind,
            field,
            operator,
            expected,
        })
    }

    fn subject(&self) -> String {
        match &self.field {
            Some(field) => format!("{} `{}`", self.kind.label(), field),
            None => self.kind.label().to_string(),
        }
    }
}

/// Outcome of evaluating one rule. Produced fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule: ValidationRule,
    pub passed: bool,
    pub message: String,
}

/// Value a rule resolved against the response, with a sentinel for "not
/// found" that is distinct from a present JSON `null`.
#[derive(Debug, Clone, PartialEq)]
enum Actual {
    Found(Value),
    Missing,
}

/// Evaluate `rules` against `response`, in order, one result per rule.
pub fn evaluate(response: &CapturedResponse, rules: &[ValidationRule]) -> Vec<ValidationResult> {
    rules.iter().map(|rule| evaluate_rule(response, rule)).collect()
}

fn evaluate_rule(response: &CapturedResponse, rule: &ValidationRule) -> ValidationResult {
    let (passed, detail) = match check_rule(response, rule) {
        Ok(outcome) => outcome,
        Err(reason) => (false, reason),
    };

    let verdict = if passed { "PASS" } else { "FAIL" };
    ValidationResult {
        rule: rule.clone(),
        passed,
        message: format!("{verdict}: {} {} ({detail})", rule.subject(), rule.operator.label()),
    }
}

fn check_rule(response: &CapturedResponse, rule: &ValidationRule) -> Result<(bool, String), String> {
    // Rules normally come through `ValidationRule::new`, but deserialized
    // collections bypass it; the undefined combination must fail here too.
    if rule.operator == RuleOperator::Exists
        && matches!(rule.kind, RuleKind::Status | RuleKind::Time)
    {
        return Err(RuleError::ExistsNotApplicable(rule.kind.label()).to_string());
    }

    let actual = resolve_actual(response, rule)?;

    if rule.operator == RuleOperator::Exists {
        return match actual {
            Actual::Found(value) => Ok((true, format!("found {}", display(&value)))),
            Actual::Missing => Ok((false, "not found".to_string())),
        };
    }

    let actual = match actual {
        Actual::Found(value) => value,
        Actual::Missing => {
            return Ok((
                false,
                format!("not found, expected {}", display(&rule.expected)),
            ));
        }
    };

    let detail = format!(
        "actual: {}, expected: {}",
        display(&actual),
        display(&rule.expected)
    );

    let passed = match rule.operator {
        RuleOperator::Equal => loose_eq(&actual, &rule.expected),
        RuleOperator::NotEqual => !loose_eq(&actual, &rule.expected),
        RuleOperator::LessThan => {
            compare(&actual, &rule.expected)? == std::cmp::Ordering::Less
        }
        RuleOperator::GreaterThan => {
            compare(&actual, &rule.expected)? == std::cmp::Ordering::Greater
        }
        RuleOperator::LessOrEqual => {
            compare(&actual, &rule.expected)? != std::cmp::Ordering::Greater
        }
        RuleOperator::GreaterOrEqual => {
            compare(&actual, &rule.expected)? != std::cmp::Ordering::Less
        }
        RuleOperator::Contains => string_form(&actual).contains(&string_form(&rule.expected)),
        RuleOperator::Exists => unreachable!("handled above"),
    };

    Ok((passed, detail))
}

fn resolve_actual(response: &CapturedResponse, rule: &ValidationRule) -> Result<Actual, String> {
    match rule.kind {
        RuleKind::Status => Ok(Actual::Found(Value::from(response.status_code))),
        RuleKind::Time => Ok(Actual::Found(Value::from(response.elapsed_ms))),
        RuleKind::JsonPath => {
            let path = rule
                .field
                .as_deref()
                .ok_or_else(|| "json_path rule has no field".to_string())?;
            Ok(resolve_path(&response.body, path))
        }
        RuleKind::Header => {
            let name = rule
                .field
                .as_deref()
                .ok_or_else(|| "header rule has no field".to_string())?;
            Ok(match response.header(name) {
                Some(value) => Actual::Found(Value::String(value.to_string())),
                None => Actual::Missing,
            })
        }
    }
}

/// Walk a dot-delimited path into a JSON value. Object keys and array
/// indices (`items.0.id`) are supported. A missing key, an out-of-range
/// index, or a `null` at any step resolves to [`Actual::Missing`].
fn resolve_path(root: &Value, path: &str) -> Actual {
    let mut current = root;

    for segment in path.split('.') {
        if segment.is_empty() {
            return Actual::Missing;
        }

        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };

        current = match next {
            Some(value) => value,
            None => return Actual::Missing,
        };
    }

    if current.is_null() {
        Actual::Missing
    } else {
        Actual::Found(current.clone())
    }
}

/// Loose equality tolerating type drift between JSON values and
/// string-encoded expectations: if either side looks numeric, both are
/// compared as numbers; otherwise their string forms are compared.
pub fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    string_form(actual) == string_form(expected)
}

fn compare(actual: &Value, expected: &Value) -> Result<std::cmp::Ordering, String> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&b).ok_or_else(|| {
            format!("cannot order {} against {}", display(actual), display(expected))
        });
    }
    Ok(string_form(actual).cmp(&string_form(expected)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// String form used for `contains` and fallback comparisons: strings are
/// taken bare, everything else is rendered as JSON.
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Display form for messages: like `string_form` but strings are quoted so
/// `"200"` and `200` are distinguishable in output.
fn display(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn response() -> CapturedResponse {
        CapturedResponse {
            status_code: 200,
            status_text: "OK".into(),
            headers: HashMap::from([(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )]),
            body: json!({
                "user": {"id": 42, "name": "dana", "email": null},
                "items": [{"sku": "a-1"}, {"sku": "b-2"}],
                "count": 2
            }),
            elapsed_ms: 120,
            size_bytes: 64,
        }
    }

    fn rule(kind: RuleKind, field: Option<&str>, operator: RuleOperator, expected: Value) -> ValidationRule {
        ValidationRule::new(kind, field.map(String::from), operator, expected).unwrap()
    }

    #[test]
    fn one_result_per_rule_in_order() {
        let rules = vec![
            rule(RuleKind::Status, None, RuleOperator::Equal, json!(200)),
            rule(RuleKind::Time, None, RuleOperator::LessThan, json!(500)),
            rule(RuleKind::JsonPath, Some("user.id"), RuleOperator::Equal, json!(42)),
        ];

        let results = evaluate(&response(), &rules);
        assert_eq!(results.len(), 3);
        for (result, rule) in results.iter().zip(&rules) {
            assert_eq!(&result.rule, rule);
            assert!(result.passed, "{}", result.message);
        }
    }

    #[test]
    fn status_equal_passes_for_matching_code() {
        let results = evaluate(
            &response(),
            &[rule(RuleKind::Status, None, RuleOperator::Equal, json!(200))],
        );
        assert!(results[0].passed);
        assert!(results[0].message.starts_with("PASS: status equal"));
    }

    #[test]
    fn loose_equality_accepts_numeric_strings() {
        let results = evaluate(
            &response(),
            &[
                rule(RuleKind::Status, None, RuleOperator::Equal, json!("200")),
                rule(RuleKind::JsonPath, Some("user.id"), RuleOperator::Equal, json!("42")),
                rule(RuleKind::JsonPath, Some("user.name"), RuleOperator::NotEqual, json!("omar")),
            ],
        );
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn json_path_exists_present_and_absent() {
        let results = evaluate(
            &response(),
            &[
                rule(RuleKind::JsonPath, Some("user.id"), RuleOperator::Exists, Value::Null),
                rule(RuleKind::JsonPath, Some("user.missing.deep"), RuleOperator::Exists, Value::Null),
                rule(RuleKind::JsonPath, Some("items.1.sku"), RuleOperator::Exists, Value::Null),
                // present but null resolves as not found
                rule(RuleKind::JsonPath, Some("user.email"), RuleOperator::Exists, Value::Null),
            ],
        );
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results[2].passed);
        assert!(!results[3].passed);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let results = evaluate(
            &response(),
            &[
                rule(RuleKind::Header, Some("Content-Type"), RuleOperator::Exists, Value::Null),
                rule(RuleKind::Header, Some("Content-Type"), RuleOperator::Contains, json!("json")),
                rule(RuleKind::Header, Some("X-Request-Id"), RuleOperator::Exists, Value::Null),
            ],
        );
        assert!(results[0].passed);
        assert!(results[1].passed);
        assert!(!results[2].passed);
    }

    #[test]
    fn contains_uses_string_forms() {
        let results = evaluate(
            &response(),
            &[
                rule(RuleKind::JsonPath, Some("user.name"), RuleOperator::Contains, json!("an")),
                rule(RuleKind::JsonPath, Some("count"), RuleOperator::Contains, json!(2)),
            ],
        );
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn ordering_operators_on_time() {
        let results = evaluate(
            &response(),
            &[
                rule(RuleKind::Time, None, RuleOperator::LessThan, json!(500)),
                rule(RuleKind::Time, None, RuleOperator::GreaterThan, json!(500)),
                rule(RuleKind::Time, None, RuleOperator::LessOrEqual, json!(120)),
                rule(RuleKind::Time, None, RuleOperator::GreaterOrEqual, json!(120)),
            ],
        );
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results[2].passed);
        assert!(results[3].passed);
    }

    #[test]
    fn missing_path_with_comparison_fails_without_aborting() {
        let rules = vec![
            rule(RuleKind::JsonPath, Some("no.such.path"), RuleOperator::Equal, json!(1)),
            rule(RuleKind::Status, None, RuleOperator::Equal, json!(200)),
        ];
        let results = evaluate(&response(), &rules);
        assert!(!results[0].passed);
        assert!(results[0].message.contains("not found"));
        assert!(results[1].passed);
    }

    #[test]
    fn exists_rejected_for_status_and_time_at_construction() {
        assert_eq!(
            ValidationRule::new(RuleKind::Status, None, RuleOperator::Exists, Value::Null),
            Err(RuleError::ExistsNotApplicable("status"))
        );
        assert_eq!(
            ValidationRule::new(RuleKind::Time, None, RuleOperator::Exists, Value::Null),
            Err(RuleError::ExistsNotApplicable("time"))
        );
    }

    #[test]
    fn field_required_for_path_and_header_rules() {
        assert_eq!(
            ValidationRule::new(RuleKind::JsonPath, None, RuleOperator::Exists, Value::Null),
            Err(RuleError::MissingField("json_path"))
        );
        assert_eq!(
            ValidationRule::new(
                RuleKind::Header,
                Some("  ".into()),
                RuleOperator::Equal,
                json!("x")
            ),
            Err(RuleError::MissingField("header"))
        );
    }

    #[test]
    fn deserialized_exists_on_status_and_time_fails() {
        // Collections deserialize rules without going through `new`; the
        // undefined exists/status and exists/time combinations must still
        // come back as failed results.
        let rules: Vec<ValidationRule> = serde_json::from_str(
            r#"[
                {"kind": "status", "operator": "exists", "expected": null},
                {"kind": "time", "operator": "exists", "expected": null}
            ]"#,
        )
        .unwrap();

        let results = evaluate(&response(), &rules);
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.passed, "{}", result.message);
            assert!(result.message.contains("not valid"), "{}", result.message);
        }
    }

    #[test]
    fn malformed_deserialized_rule_fails_gracefully() {
        // A rule that skipped the constructor (e.g. hand-edited JSON) still
        // yields a failed result instead of a panic.
        let bad: ValidationRule =
            serde_json::from_str(r#"{"kind":"json_path","operator":"equal","expected":1}"#)
                .unwrap();
        let results = evaluate(&response(), &[bad]);
        assert!(!results[0].passed);
        assert!(results[0].message.contains("no field"));
    }

    #[test]
    fn evaluate_is_idempotent() {
        let rules = vec![
            rule(RuleKind::Status, None, RuleOperator::Equal, json!(200)),
            rule(RuleKind::Header, Some("content-type"), RuleOperator::Contains, json!("json")),
            rule(RuleKind::JsonPath, Some("user.id"), RuleOperator::GreaterThan, json!(10)),
        ];
        let resp = response();
        assert_eq!(evaluate(&resp, &rules), evaluate(&resp, &rules));
    }

    #[test]
    fn message_names_kind_operator_and_values() {
        let results = evaluate(
            &response(),
            &[rule(RuleKind::Time, None, RuleOperator::LessThan, json!(500))],
        );
        let message = &results[0].message;
        assert!(message.contains("time"));
        assert!(message.contains("less_than"));
        assert!(message.contains("120"));
        assert!(message.contains("500"));
        assert!(message.contains("PASS"));
    }
}
