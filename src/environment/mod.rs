//! # Environment & Variables
//!
//! Named variable sets used for `{{variable}}` request templating, with
//! global, environment, and collection scopes and multi-environment
//! switching (dev / staging / prod).
//!
//! Variables here are request-templating state, not process environment
//! variables. Persistence lives in [`crate::storage`]; this module only
//! resolves scopes into a flat snapshot and performs interpolation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Scope at which a variable is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Global,
    Environment,
    Collection,
}

/// A single variable entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    pub scope: VariableScope,
    pub enabled: bool,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>, scope: VariableScope) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope,
            enabled: true,
        }
    }
}

/// A named set of variables (e.g. dev, staging, prod).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub variables: Vec<Variable>,
}

/// Holds all environments and resolves the active variable set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentManager {
    pub globals: Vec<Variable>,
    pub environments: Vec<Environment>,
    pub active_environment: Option<String>,
}

impl EnvironmentManager {
    /// Switch the active environment. Unknown names are an error so a CI run
    /// against a misspelled `--env` fails loudly instead of running with the
    /// wrong variable set.
    pub fn activate(&mut self, name: &str) -> Result<(), String> {
        if self.environments.iter().any(|env| env.name == name) {
            self.active_environment = Some(name.to_string());
            Ok(())
        } else {
            Err(format!("Unknown environment `{name}`"))
        }
    }

    /// Resolve all scopes into a flat map, respecting precedence:
    /// collection < environment < global (higher scope overrides lower).
    ///
    /// The returned map is a snapshot owned by the caller; one request cycle
    /// mutates its own snapshot and never this manager (see the runner).
    pub fn resolve(&self, collection_vars: &HashMap<String, String>) -> HashMap<String, String> {
        let mut resolved = collection_vars.clone();

        if let Some(active_name) = &self.active_environment {
            if let Some(env) = self.environments.iter().find(|e| &e.name == active_name) {
                for var in &env.variables {
                    if var.enabled && !var.key.is_empty() {
                        resolved.insert(var.key.clone(), var.value.clone());
                    }
                }
            }
        }

        for var in &self.globals {
            if var.enabled && !var.key.is_empty() {
                resolved.insert(var.key.clone(), var.value.clone());
            }
        }

        resolved
    }
}

/// Replace `{{key}}` placeholders in `input` with values from `variables`.
/// Placeholders with no matching key are left verbatim.
pub fn interpolate(input: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let key = &after_open[..end];
                match variables.get(key.trim()) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated placeholder, emit as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
