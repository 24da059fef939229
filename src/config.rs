//! # Configuration Documents
//!
//! The harness consumes two documents, both JSON or YAML:
//!
//! - the global configuration: a free-form object with at least `runs`, and
//!   optionally `search_paths` and `continue_on_error`. Every key is passed
//!   through into the report, and per-benchmark overrides are merged over it
//!   key by key;
//! - the optional suite document: extra `search_paths` and an ordered
//!   `benchmarks` list with per-entry `config` and `parameters` overrides.

use crate::plugin::ParameterSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const RUNS_KEY: &str = "runs";
pub const SEARCH_PATHS_KEY: &str = "search_paths";
pub const CONTINUE_ON_ERROR_KEY: &str = "continue_on_error";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {} as JSON or YAML: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Global or per-benchmark configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(Map<String, Value>);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Load a configuration document from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path).map(Self)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Number of iterations per parameter set. Required and positive.
    pub fn runs(&self) -> Result<usize, ConfigError> {
        let value = self.0.get(RUNS_KEY).ok_or(ConfigError::MissingKey(RUNS_KEY))?;
        match value.as_u64() {
            Some(0) => Err(invalid(RUNS_KEY, "must be at least 1")),
            Some(runs) => usize::try_from(runs).map_err(|_| invalid(RUNS_KEY, "out of range")),
            None => Err(invalid(
                RUNS_KEY,
                format!("expected a positive integer, got {}", value),
            )),
        }
    }

    /// Search locations, empty when absent.
    pub fn search_paths(&self) -> Result<Vec<PathBuf>, ConfigError> {
        match self.0.get(SEARCH_PATHS_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(PathBuf::from).ok_or_else(|| {
                        invalid(SEARCH_PATHS_KEY, format!("expected a path string, got {}", item))
                    })
                })
                .collect(),
            Some(other) => Err(invalid(
                SEARCH_PATHS_KEY,
                format!("expected a list of paths, got {}", other),
            )),
        }
    }

    pub fn set_search_paths(&mut self, paths: &[PathBuf]) {
        let paths: Vec<Value> = paths
            .iter()
            .map(|p| Value::from(p.to_string_lossy().into_owned()))
            .collect();
        self.set(SEARCH_PATHS_KEY, paths);
    }

    /// Whether lifecycle failures skip the benchmark instead of aborting.
    pub fn continue_on_error(&self) -> bool {
        self.0
            .get(CONTINUE_ON_ERROR_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(crate::defaults::CONTINUE_ON_ERROR)
    }

    /// A copy of `self` with every key of `overrides` replacing its own.
    pub fn merged(&self, overrides: &Map<String, Value>) -> Self {
        let mut merged = self.0.clone();
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// The suite document: which benchmarks to run and with which overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteDocument {
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// When absent every discovered benchmark runs.
    #[serde(default)]
    pub benchmarks: Option<Vec<SuiteEntry>>,
}

impl SuiteDocument {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub config: Map<String, Value>,

    /// Replaces the benchmark's default parameter sets when present.
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSet>>,
}

impl SuiteEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Read `path` as JSON, falling back to YAML.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    match serde_json::from_str(text) {
        Ok(document) => Ok(document),
        Err(json_err) => {
            debug!("Not valid JSON ({}), trying YAML", json_err);
            serde_yaml::from_str(text).map_err(|yaml_err| yaml_err.to_string())
        }
    }
}
