//! Flat-file persistence for environments and run history, kept under a
//! `.testman/` directory in the working directory. Missing files yield
//! defaults so a fresh checkout works without setup.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::environment::EnvironmentManager;
use crate::history::History;

const DATA_DIR: &str = ".testman";
const ENVIRONMENTS_FILE: &str = "environments.json";
const HISTORY_FILE: &str = "history.json";

pub fn load_environments() -> Result<EnvironmentManager> {
    load_or_default(ENVIRONMENTS_FILE)
}

pub fn save_environments(manager: &EnvironmentManager) -> Result<()> {
    save(ENVIRONMENTS_FILE, manager)
}

pub fn load_history() -> Result<History> {
    load_or_default(HISTORY_FILE)
}

pub fn save_history(history: &History) -> Result<()> {
    save(HISTORY_FILE, history)
}

fn load_or_default<T: DeserializeOwned + Default>(name: &str) -> Result<T> {
    let file = data_dir().join(name);
    if !file.exists() {
        return Ok(T::default());
    }

    let raw = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read `{}`", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse `{}`", file.display()))
}

fn save<T: Serialize>(name: &str, value: &T) -> Result<()> {
    let dir = data_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory `{}`", dir.display()))?;

    let file = dir.join(name);
    let raw = serde_json::to_string_pretty(value).context("Failed to serialize")?;
    fs::write(&file, raw).with_context(|| format!("Failed to write `{}`", file.display()))
}

fn data_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DATA_DIR)
}
