//! # Collections
//!
//! A collection is a named, ordered set of request definitions plus
//! collection-scoped variables, stored as a JSON file and runnable as a
//! batch from the CLI.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::http::request::RequestDefinition;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub requests: Vec<RequestDefinition>,
}

impl Collection {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read collection file `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse collection file `{}`", path.display()))
    }
}
