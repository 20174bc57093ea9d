//! Configuration for tools built on the tracking model.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::RenderOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapestryConfig {
    /// How result trees are rendered at the end of a run.
    pub render: RenderOptions,

    pub status: StatusConfig,
}

/// Status tracker behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Forward task status messages to the log as they are recorded.
    pub echo_task_messages: bool,

    /// Print the generator message log after the run.
    pub print_generator_log: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            echo_task_messages: true,
            print_generator_log: true,
        }
    }
}

impl TapestryConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let c = TapestryConfig::default();
        assert_eq!(c.render, RenderOptions::default());
        assert!(c.status.echo_task_messages);
        assert!(c.status.print_generator_log);
    }

    #[test]
    fn empty_object_gives_defaults() {
        let c = TapestryConfig::from_json_str("{}").unwrap();
        assert_eq!(c, TapestryConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let json = r#"
        {
          "render": { "failures_only": true },
          "status": { "echo_task_messages": false }
        }"#;
        let c = TapestryConfig::from_json_str(json).unwrap();
        assert!(c.render.failures_only);
        assert!(!c.render.include_timings);
        assert!(!c.status.echo_task_messages);
        assert!(c.status.print_generator_log);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = TapestryConfig::from_json_str("{ render: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TapestryConfig::load("/definitely/not/here/tapestry.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("tapestry.json"));
    }
}
