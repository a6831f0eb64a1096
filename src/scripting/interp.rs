//! Evaluator for the parsed script. The only bindings in scope are the
//! fixed capabilities (`environment`, `response`, `test`, `expect`, `log`);
//! everything else is a runtime error.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::http::response::CapturedResponse;
use crate::validation::loose_eq;

use super::parser::Expr;
use super::{AssertionRecord, ScriptError};

/// Runtime value. `Undefined` is distinct from JSON `null`: it marks an
/// absent key or variable, matching the validation engine's "not found"
/// sentinel.
#[derive(Debug, Clone)]
enum ScriptValue {
    Data(Value),
    Undefined,
    Closure(Rc<Vec<Expr>>),
    EnvironmentObj,
    ResponseObj,
    ResponseTo,
    ResponseToHave,
    /// `expect(actual)`, waiting for `.to`.
    Expectation(Rc<ScriptValue>),
    /// `expect(actual).to`, waiting for `equal`, `exist`, or `be`.
    ExpectationTo(Rc<ScriptValue>),
    /// `expect(actual).to.be`, waiting for `below`.
    ExpectationToBe(Rc<ScriptValue>),
    Method(Method),
}

#[derive(Debug, Clone)]
enum Method {
    EnvGet,
    EnvSet,
    ResponseJson,
    ResponseHaveStatus,
    Test,
    Expect,
    Log,
    ExpectEqual(Rc<ScriptValue>),
    ExpectBelow(Rc<ScriptValue>),
    ExpectExist(Rc<ScriptValue>),
}

pub(super) struct Interpreter<'a> {
    env: &'a mut HashMap<String, String>,
    response: Option<&'a CapturedResponse>,
    pub log_lines: Vec<String>,
    pub assertions: Vec<AssertionRecord>,
}

impl<'a> Interpreter<'a> {
    pub(super) fn new(
        env: &'a mut HashMap<String, String>,
        response: Option<&'a CapturedResponse>,
    ) -> Self {
        Self {
            env,
            response,
            log_lines: Vec::new(),
            assertions: Vec::new(),
        }
    }

    pub(super) fn exec(&mut self, program: &[Expr]) -> Result<(), ScriptError> {
        for statement in program {
            self.eval(statement)?;
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<ScriptValue, ScriptError> {
        match expr {
            Expr::Str(s) => Ok(ScriptValue::Data(Value::String(s.clone()))),
            Expr::Num(n) => Ok(ScriptValue::Data(json_number(*n))),
            Expr::Bool(b) => Ok(ScriptValue::Data(Value::Bool(*b))),
            Expr::Null => Ok(ScriptValue::Data(Value::Null)),
            Expr::Arrow(body) => Ok(ScriptValue::Closure(Rc::new(body.clone()))),
            Expr::Ident(name) => self.lookup(name),
            Expr::Member(object, name) => {
                let object = self.eval(object)?;
                self.member(object, name)
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(callee, args)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<ScriptValue, ScriptError> {
        match name {
            "environment" => Ok(ScriptValue::EnvironmentObj),
            "response" => {
                if self.response.is_some() {
                    Ok(ScriptValue::ResponseObj)
                } else {
                    Err(runtime(
                        "`response` is not available before the request is sent",
                    ))
                }
            }
            "test" => Ok(ScriptValue::Method(Method::Test)),
            "expect" => Ok(ScriptValue::Method(Method::Expect)),
            "log" => Ok(ScriptValue::Method(Method::Log)),
            other => Err(runtime(&format!("`{other}` is not defined"))),
        }
    }

    fn member(&mut self, object: ScriptValue, name: &str) -> Result<ScriptValue, ScriptError> {
        match object {
            ScriptValue::EnvironmentObj => match name {
                "get" => Ok(ScriptValue::Method(Method::EnvGet)),
                "set" => Ok(ScriptValue::Method(Method::EnvSet)),
                _ => Err(runtime(&format!("`environment` has no member `{name}`"))),
            },
            ScriptValue::ResponseObj => {
                let response = self.captured()?;
                match name {
                    "status" => Ok(ScriptValue::Data(Value::from(response.status_code))),
                    "statusText" => Ok(ScriptValue::Data(Value::String(
                        response.status_text.clone(),
                    ))),
                    "headers" => {
                        let headers: serde_json::Map<String, Value> = response
                            .headers
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                            .collect();
                        Ok(ScriptValue::Data(Value::Object(headers)))
                    }
                    "responseTime" => Ok(ScriptValue::Data(Value::from(response.elapsed_ms))),
                    "json" => Ok(ScriptValue::Method(Method::ResponseJson)),
                    "to" => Ok(ScriptValue::ResponseTo),
                    _ => Err(runtime(&format!("`response` has no member `{name}`"))),
                }
            }
            ScriptValue::ResponseTo => match name {
                "have" => Ok(ScriptValue::ResponseToHave),
                _ => Err(runtime(&format!("`response.to` has no member `{name}`"))),
            },
            ScriptValue::ResponseToHave => match name {
                "status" => Ok(ScriptValue::Method(Method::ResponseHaveStatus)),
                _ => Err(runtime(&format!(
                    "`response.to.have` has no member `{name}`"
                ))),
            },
            ScriptValue::Expectation(actual) => match name {
                "to" => Ok(ScriptValue::ExpectationTo(actual)),
                _ => Err(runtime(&format!(
                    "expected `.to` after expect(...), found `{name}`"
                ))),
            },
            ScriptValue::ExpectationTo(actual) => match name {
                "equal" => Ok(ScriptValue::Method(Method::ExpectEqual(actual))),
                "exist" => Ok(ScriptValue::Method(Method::ExpectExist(actual))),
                "be" => Ok(ScriptValue::ExpectationToBe(actual)),
                _ => Err(runtime(&format!("unknown matcher `{name}`"))),
            },
            ScriptValue::ExpectationToBe(actual) => match name {
                "below" => Ok(ScriptValue::Method(Method::ExpectBelow(actual))),
                _ => Err(runtime(&format!("unknown matcher `be.{name}`"))),
            },
            ScriptValue::Data(Value::Object(map)) => Ok(map
                .get(name)
                .map(|value| ScriptValue::Data(value.clone()))
                .unwrap_or(ScriptValue::Undefined)),
            ScriptValue::Undefined => Err(runtime(&format!(
                "cannot read `{name}` of undefined"
            ))),
            other => Err(runtime(&format!(
                "cannot read `{name}` of {}",
                describe(&other)
            ))),
        }
    }

    fn call(
        &mut self,
        callee: ScriptValue,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, ScriptError> {
        let method = match callee {
            ScriptValue::Method(method) => method,
            ScriptValue::Closure(body) => {
                self.exec(&body)?;
                return Ok(ScriptValue::Undefined);
            }
            other => return Err(runtime(&format!("{} is not callable", describe(&other)))),
        };

        match method {
            Method::EnvGet => {
                let key = string_arg(&args, 0, "environment.get")?;
                Ok(match self.env.get(&key) {
                    Some(value) => ScriptValue::Data(Value::String(value.clone())),
                    None => ScriptValue::Undefined,
                })
            }
            Method::EnvSet => {
                let key = string_arg(&args, 0, "environment.set")?;
                let value = match args.get(1) {
                    Some(ScriptValue::Data(Value::String(s))) => s.clone(),
                    Some(ScriptValue::Data(other)) => other.to_string(),
                    _ => {
                        return Err(runtime("environment.set requires a key and a value"));
                    }
                };
                self.log_lines
                    .push(format!("environment.set: {key} = {value}"));
                self.env.insert(key, value);
                Ok(ScriptValue::Undefined)
            }
            Method::ResponseJson => {
                let response = self.captured()?;
                // Deep copy so scripts can never alias the snapshot.
                Ok(ScriptValue::Data(response.body.clone()))
            }
            Method::ResponseHaveStatus => {
                let response = self.captured()?;
                let expected = number_arg(&args, 0, "response.to.have.status")?;
                if f64::from(response.status_code) == expected {
                    Ok(ScriptValue::Undefined)
                } else {
                    Err(runtime(&format!(
                        "expected response status {expected} but got {}",
                        response.status_code
                    )))
                }
            }
            Method::Test => {
                let name = string_arg(&args, 0, "test")?;
                let Some(ScriptValue::Closure(body)) = args.get(1).cloned() else {
                    return Err(runtime("test requires a name and a callback"));
                };
                // A failing callback is recorded, never propagated: one bad
                // named assertion must not stop the rest of the script.
                match self.exec(&body) {
                    Ok(()) => {
                        self.log_lines.push(format!("PASS {name}"));
                        self.assertions.push(AssertionRecord { name, passed: true });
                    }
                    Err(err) => {
                        self.log_lines.push(format!("FAIL {name}: {err}"));
                        self.assertions.push(AssertionRecord { name, passed: false });
                    }
                }
                Ok(ScriptValue::Undefined)
            }
            Method::Expect => match args.into_iter().next() {
                Some(actual) => Ok(ScriptValue::Expectation(Rc::new(actual))),
                None => Err(runtime("expect requires a value")),
            },
            Method::ExpectEqual(actual) => {
                let expected = data_arg(&args, 0, "equal")?;
                let matched = match actual.as_ref() {
                    ScriptValue::Data(actual) => loose_eq(actual, &expected),
                    _ => false,
                };
                if matched {
                    Ok(ScriptValue::Undefined)
                } else {
                    Err(runtime(&format!(
                        "expected {} to equal {expected}",
                        render(&actual)
                    )))
                }
            }
            Method::ExpectBelow(actual) => {
                let expected = number_arg(&args, 0, "below")?;
                let actual_num = match actual.as_ref() {
                    ScriptValue::Data(value) => value
                        .as_f64()
                        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok())),
                    _ => None,
                };
                match actual_num {
                    Some(n) if n < expected => Ok(ScriptValue::Undefined),
                    _ => Err(runtime(&format!(
                        "expected {} to be below {expected}",
                        render(&actual)
                    ))),
                }
            }
            Method::ExpectExist(actual) => match actual.as_ref() {
                ScriptValue::Undefined | ScriptValue::Data(Value::Null) => Err(runtime(
                    &format!("expected {} to exist", render(&actual)),
                )),
                _ => Ok(ScriptValue::Undefined),
            },
            Method::Log => {
                let line = args
                    .iter()
                    .map(render_bare)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.log_lines.push(line);
                Ok(ScriptValue::Undefined)
            }
        }
    }

    fn captured(&self) -> Result<&'a CapturedResponse, ScriptError> {
        self.response.ok_or_else(|| {
            runtime("`response` is not available before the request is sent")
        })
    }
}

fn runtime(message: &str) -> ScriptError {
    ScriptError::Runtime(message.to_string())
}

/// Keep whole numbers integral so messages read `200`, not `200.0`.
fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn string_arg(args: &[ScriptValue], index: usize, what: &str) -> Result<String, ScriptError> {
    match args.get(index) {
        Some(ScriptValue::Data(Value::String(s))) => Ok(s.clone()),
        _ => Err(runtime(&format!("{what} requires a string argument"))),
    }
}

fn number_arg(args: &[ScriptValue], index: usize, what: &str) -> Result<f64, ScriptError> {
    match args.get(index) {
        Some(ScriptValue::Data(Value::Number(n))) => n
            .as_f64()
            .ok_or_else(|| runtime(&format!("{what} requires a numeric argument"))),
        _ => Err(runtime(&format!("{what} requires a numeric argument"))),
    }
}

fn data_arg(args: &[ScriptValue], index: usize, what: &str) -> Result<Value, ScriptError> {
    match args.get(index) {
        Some(ScriptValue::Data(value)) => Ok(value.clone()),
        Some(ScriptValue::Undefined) => Ok(Value::Null),
        _ => Err(runtime(&format!("{what} requires a value argument"))),
    }
}

/// Error-message rendering: JSON notation, `undefined` for the sentinel.
fn render(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Data(data) => data.to_string(),
        ScriptValue::Undefined => "undefined".to_string(),
        other => describe(other).to_string(),
    }
}

/// Log rendering: strings print bare, like a console.
fn render_bare(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Data(Value::String(s)) => s.clone(),
        other => render(other),
    }
}

fn describe(value: &ScriptValue) -> &'static str {
    match value {
        ScriptValue::Data(_) => "a value",
        ScriptValue::Undefined => "undefined",
        ScriptValue::Closure(_) => "a function",
        ScriptValue::EnvironmentObj => "`environment`",
        ScriptValue::ResponseObj => "`response`",
        ScriptValue::ResponseTo => "`response.to`",
        ScriptValue::ResponseToHave => "`response.to.have`",
        ScriptValue::Expectation(_)
        | ScriptValue::ExpectationTo(_)
        | ScriptValue::ExpectationToBe(_) => "an expectation",
        ScriptValue::Method(_) => "a builtin",
    }
}
