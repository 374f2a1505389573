//! Configuration for registering the suspension filter.
//!
//! Loaded from a standalone TOML file, from the
//! `[package.metadata.yield-guard]` table of a Cargo manifest, or from the
//! environment.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::event::{EventKind, EventSet};

/// Environment variable overriding [`GuardConfig::events`] (comma separated).
pub const EVENTS_ENV: &str = "YIELD_GUARD_EVENTS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Name the filter is registered under.
    pub tool_name: String,

    /// Event kinds delivered to the filter.
    pub events: Vec<EventKind>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            tool_name: default_tool_name(),
            events: vec![EventKind::Yield, EventKind::Await],
        }
    }
}

fn default_tool_name() -> String {
    "yield-guard".to_string()
}

impl GuardConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = source.parse()?;
        let section = table
            .get("package")
            .and_then(|package| package.get("metadata"))
            .and_then(|metadata| metadata.get("yield-guard"))
            .cloned();

        let config: GuardConfig = match section {
            Some(section) => section.try_into()?,
            None => toml::Value::Table(table).try_into()?,
        };
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults with [`EVENTS_ENV`] applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var(EVENTS_ENV) {
            self.events = parse_event_list(&raw)?;
        }
        Ok(self)
    }

    pub fn event_set(&self) -> EventSet {
        self.events
            .iter()
            .fold(EventSet::empty(), |set, kind| set | EventSet::from(*kind))
    }
}

fn parse_event_list(raw: &str) -> Result<Vec<EventKind>, ConfigError> {
    raw.split(',')
        .filter(|item| !item.trim().is_empty())
        .map(str::parse)
        .collect()
}
