//! Handler configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// When false the handler resolves to empty sets and ignores policy.
    pub enabled: bool,
    /// Newline-delimited public sets file.
    pub component_sets_path: Option<PathBuf>,
    /// Where the finalized sets are persisted between runs.
    pub persisted_sets_path: Option<PathBuf>,
    /// Comma-separated manual set, owner first.
    pub manual_set: Option<String>,
    /// Public suffix list file installed before any parsing.
    pub psl_path: Option<PathBuf>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            component_sets_path: None,
            persisted_sets_path: None,
            manual_set: None,
            psl_path: None,
        }
    }
}

impl HandlerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A config that finishes loading with empty sets.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = HandlerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, HandlerConfig::default());
        assert!(config.enabled);
    }

    #[test]
    fn parses_all_fields() {
        let config = HandlerConfig::from_json_str(
            r#"{
                "enabled": false,
                "component_sets_path": "sets.json",
                "persisted_sets_path": "persisted.json",
                "manual_set": "https://a.test,https://b.test",
                "psl_path": "public_suffix_list.dat"
            }"#,
        )
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.component_sets_path, Some(PathBuf::from("sets.json")));
        assert_eq!(config.manual_set.as_deref(), Some("https://a.test,https://b.test"));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(HandlerConfig::from_json_str(r#"{"enable": true}"#).is_err());
    }

    #[test]
    fn reports_missing_file() {
        let err = HandlerConfig::from_json_file(Path::new("/nonexistent/fps-config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
