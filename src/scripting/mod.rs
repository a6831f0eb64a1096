//! # Script Sandbox
//!
//! Runs user-authored pre-request / post-response scripts against a fixed
//! capability surface: environment variable access, read-only response
//! projections, named `test(...)` assertions, `expect(...)` matchers, and a
//! scoped `log(...)`. Scripts are parsed with a closed grammar rather than
//! handed to a general-purpose engine, so nothing outside the injected
//! capabilities is reachable: no ambient globals, filesystem, network, or
//! timers.
//!
//! Failure is data: parse errors and uncaught runtime errors come back in
//! the [`ScriptOutcome`], never as an error to the caller.

mod interp;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::response::CapturedResponse;

use interp::Interpreter;

/// Error raised while parsing or executing a script. Internal to the
/// sandbox; `run` converts it into the outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Runtime(String),
}

/// Mutable state threaded through one request cycle's hook invocations.
/// The pre-hook sees no response; the post-hook sees the same variable map
/// plus the captured response.
pub struct ScriptExecutionContext<'a> {
    pub environment_variables: &'a mut HashMap<String, String>,
    pub response: Option<&'a CapturedResponse>,
}

/// One `test(name, ...)` registration, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub name: String,
    pub passed: bool,
}

/// Observable effects of one script run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    /// False only when the top-level script body failed; a failing
    /// `test(...)` callback does not clear this.
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub log_lines: Vec<String>,
    pub assertions: Vec<AssertionRecord>,
}

impl ScriptOutcome {
    /// True when the script body succeeded and every named assertion passed.
    pub fn all_passed(&self) -> bool {
        self.succeeded && self.assertions.iter().all(|a| a.passed)
    }
}

/// Execute `script` against `ctx`. Never returns an error and never panics;
/// whatever was logged or asserted before a failure is preserved in the
/// outcome.
pub fn run(script: &str, ctx: ScriptExecutionContext<'_>) -> ScriptOutcome {
    let program = match parser::parse(script) {
        Ok(program) => program,
        Err(err) => {
            return ScriptOutcome {
                succeeded: false,
                error_message: Some(err.to_string()),
                ..ScriptOutcome::default()
            };
        }
    };

    let mut interpreter = Interpreter::new(ctx.environment_variables, ctx.response);
    let result = interpreter.exec(&program);

    ScriptOutcome {
        succeeded: result.is_ok(),
        error_message: result.err().map(|err| err.to_string()),
        log_lines: interpreter.log_lines,
        assertions: interpreter.assertions,
    }
}
