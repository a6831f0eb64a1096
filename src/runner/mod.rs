//! # Collection Runner
//!
//! Drives the request cycle in its fixed order: pre-request script →
//! placeholder resolution and dispatch → post-response script → validation.
//! The post-hook may set variables the next request's build step consumes,
//! so requests in a collection run serially over one shared variable map.
//!
//! Script failures and transport errors are recorded in the report and
//! never abort the batch.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collections::Collection;
use crate::environment::EnvironmentManager;
use crate::http::client;
use crate::http::method::HttpMethod;
use crate::http::request::RequestDefinition;
use crate::http::response::CapturedResponse;
use crate::scripting::{self, ScriptExecutionContext, ScriptOutcome};
use crate::validation::{self, ValidationResult};

/// Everything observed while executing one request definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReport {
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    /// None when the request never produced a response.
    pub status: Option<u16>,
    pub duration_ms: Option<u64>,
    /// Transport-level failure (bad URL, connection refused, timeout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_script: Option<ScriptOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_script: Option<ScriptOutcome>,
    pub validations: Vec<ValidationResult>,
}

impl RequestReport {
    /// A request passes when it reached the server, both scripts ran clean
    /// with all named assertions passing, and every validation rule passed.
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self.pre_script.as_ref().is_none_or(ScriptOutcome::all_passed)
            && self.post_script.as_ref().is_none_or(ScriptOutcome::all_passed)
            && self.validations.iter().all(|v| v.passed)
    }

    /// (passed, failed) counts across validations and named assertions.
    pub fn check_counts(&self) -> (usize, usize) {
        let mut passed = 0;
        let mut failed = 0;

        for validation in &self.validations {
            if validation.passed {
                passed += 1;
            } else {
                failed += 1;
            }
        }
        for outcome in [&self.pre_script, &self.post_script].into_iter().flatten() {
            for assertion in &outcome.assertions {
                if assertion.passed {
                    passed += 1;
                } else {
                    failed += 1;
                }
            }
            if !outcome.succeeded {
                failed += 1;
            }
        }
        if self.error.is_some() {
            failed += 1;
        }

        (passed, failed)
    }
}

/// Summary of one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub collection: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub requests: Vec<RequestReport>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Execute one request cycle against a shared variable map.
pub async fn execute_request(
    definition: &RequestDefinition,
    variables: &mut HashMap<String, String>,
) -> RequestReport {
    debug!(name = %definition.label(), "executing request");

    let pre_script = match definition.pre_request_script.as_deref() {
        Some(script) => Some(scripting::run(
            script,
            ScriptExecutionContext {
                environment_variables: &mut *variables,
                response: None,
            },
        )),
        None => None,
    };

    // Placeholders are substituted after the pre-hook so its writes are
    // visible to request construction.
    let resolved = definition.resolve(variables);

    let (response, error): (Option<CapturedResponse>, Option<String>) =
        match client::send(&resolved).await {
            Ok(response) => (Some(response), None),
            Err(err) => (None, Some(format!("{err:#}"))),
        };

    let post_script = match (&response, definition.post_response_script.as_deref()) {
        (Some(response), Some(script)) => Some(scripting::run(
            script,
            ScriptExecutionContext {
                environment_variables: &mut *variables,
                response: Some(response),
            },
        )),
        _ => None,
    };

    let validations = response
        .as_ref()
        .map(|response| validation::evaluate(response, &definition.rules))
        .unwrap_or_default();

    RequestReport {
        name: definition.label(),
        method: definition.method,
        url: resolved.url,
        status: response.as_ref().map(|r| r.status_code),
        duration_ms: response.as_ref().map(|r| r.elapsed_ms),
        error,
        pre_script,
        post_script,
        validations,
    }
}

/// Run every request in a collection serially, threading one variable map
/// through all cycles.
pub async fn run_collection(
    collection: &Collection,
    environments: &EnvironmentManager,
) -> RunReport {
    let mut variables = environments.resolve(&collection.variables);
    let started = Instant::now();

    let mut requests = Vec::with_capacity(collection.requests.len());
    for definition in &collection.requests {
        requests.push(execute_request(definition, &mut variables).await);
    }

    let passed = requests.iter().filter(|r| r.passed()).count();
    RunReport {
        collection: collection.name.clone(),
        total: requests.len(),
        passed,
        failed: requests.len() - passed,
        duration_ms: started.elapsed().as_millis() as u64,
        requests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::AssertionRecord;
    use crate::validation::{RuleKind, RuleOperator, ValidationRule};
    use httpmock::prelude::*;
    use serde_json::json;

    fn report_skeleton() -> RequestReport {
        RequestReport {
            name: "r".into(),
            method: HttpMethod::Get,
            url: "https://example.com".into(),
            status: Some(200),
            duration_ms: Some(10),
            error: None,
            pre_script: None,
            post_script: None,
            validations: Vec::new(),
        }
    }

    #[test]
    fn report_fails_on_transport_error() {
        let mut report = report_skeleton();
        assert!(report.passed());
        report.error = Some("connection refused".into());
        assert!(!report.passed());
        assert_eq!(report.check_counts(), (0, 1));
    }

    #[test]
    fn report_fails_on_failed_named_assertion() {
        let mut report = report_skeleton();
        report.post_script = Some(ScriptOutcome {
            succeeded: true,
            error_message: None,
            log_lines: vec![],
            assertions: vec![
                AssertionRecord {
                    name: "a".into(),
                    passed: true,
                },
                AssertionRecord {
                    name: "b".into(),
                    passed: false,
                },
            ],
        });
        assert!(!report.passed());
        assert_eq!(report.check_counts(), (1, 1));
    }

    #[test]
    fn report_fails_on_script_body_error() {
        let mut report = report_skeleton();
        report.pre_script = Some(ScriptOutcome {
            succeeded: false,
            error_message: Some("`nope` is not defined".into()),
            log_lines: vec![],
            assertions: vec![],
        });
        assert!(!report.passed());
        assert_eq!(report.check_counts(), (0, 1));
    }

    #[tokio::test]
    async fn full_cycle_against_mock_server() {
        let server = MockServer::start_async().await;

        let login = server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"token": "abc123"}));
            })
            .await;
        let profile = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/users/me")
                    .header("authorization", "Bearer abc123");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"id": 42, "name": "dana"}));
            })
            .await;

        let collection: Collection = serde_json::from_value(json!({
            "name": "smoke",
            "variables": {"base": server.base_url()},
            "requests": [
                {
                    "name": "login",
                    "method": "POST",
                    "url": "{{base}}/login",
                    "body": "{}",
                    "postResponseScript":
                        "environment.set('token', response.json().token)\n\
                         test('logged in', () => response.to.have.status(200))",
                    "rules": [
                        {"kind": "status", "operator": "equal", "expected": 200},
                        {"kind": "time", "operator": "less_than", "expected": 5000}
                    ]
                },
                {
                    "name": "profile",
                    "method": "GET",
                    "url": "{{base}}/users/me",
                    "headers": {"Authorization": "Bearer {{token}}"},
                    "rules": [
                        {"kind": "json_path", "field": "id", "operator": "exists", "expected": null},
                        {"kind": "header", "field": "Content-Type", "operator": "contains", "expected": "json"}
                    ]
                }
            ]
        }))
        .unwrap();

        let report = run_collection(&collection, &EnvironmentManager::default()).await;

        login.assert_async().await;
        profile.assert_async().await;

        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 2, "{report:#?}");
        assert!(report.all_passed());

        let login_report = &report.requests[0];
        assert_eq!(login_report.status, Some(200));
        assert!(login_report.post_script.as_ref().unwrap().all_passed());
        assert!(login_report.validations.iter().all(|v| v.passed));
    }

    #[tokio::test]
    async fn transport_error_does_not_abort_the_batch() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/ok");
                then.status(200);
            })
            .await;

        let collection: Collection = serde_json::from_value(json!({
            "name": "mixed",
            "requests": [
                {"name": "bad", "method": "GET", "url": "not a url"},
                {"name": "good", "method": "GET", "url": format!("{}/ok", server.base_url()),
                 "rules": [{"kind": "status", "operator": "equal", "expected": 200}]}
            ]
        }))
        .unwrap();

        let report = run_collection(&collection, &EnvironmentManager::default()).await;
        ok.assert_async().await;

        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert!(report.requests[0].error.is_some());
        assert!(report.requests[1].passed());
    }

    #[tokio::test]
    async fn pre_hook_variables_feed_request_construction() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/items").query_param("page", "3");
                then.status(200);
            })
            .await;

        let collection: Collection = serde_json::from_value(json!({
            "name": "pre",
            "variables": {"base": server.base_url()},
            "requests": [{
                "name": "list",
                "method": "GET",
                "url": "{{base}}/items",
                "params": {"page": "{{page}}"},
                "preRequestScript": "environment.set('page', '3')"
            }]
        }))
        .unwrap();

        let report = run_collection(&collection, &EnvironmentManager::default()).await;
        mock.assert_async().await;
        assert!(report.all_passed());
    }
}
