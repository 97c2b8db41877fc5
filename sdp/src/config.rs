use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{LOG_DESTINATION_VAR, RULES_PATH_VAR};

/// Where decision lines are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    Stdout,
    /// Opened for append, created if missing.
    File(PathBuf),
}

impl LogDestination {
    /// An empty value means stdout, anything else is a file path.
    pub fn from_value(value: impl Into<OsString>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

/// Startup configuration for an [Engine](crate::Engine).
///
/// Without a rules path the engine is disabled and leaves every socket alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    rules: Option<PathBuf>,
    log: Option<LogDestination>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `SDP_CONF` for the rules path and `SDP_DEBUG` for the log destination.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            rules: lookup(RULES_PATH_VAR).map(PathBuf::from),
            log: lookup(LOG_DESTINATION_VAR).map(LogDestination::from_value),
        }
    }

    pub fn with_rules(self, path: impl Into<PathBuf>) -> Self {
        Self {
            rules: Some(path.into()),
            ..self
        }
    }

    pub fn with_log(self, destination: LogDestination) -> Self {
        Self {
            log: Some(destination),
            ..self
        }
    }

    pub fn rules_path(&self) -> Option<&Path> {
        self.rules.as_deref()
    }

    pub fn log_destination(&self) -> Option<&LogDestination> {
        self.log.as_ref()
    }
}
