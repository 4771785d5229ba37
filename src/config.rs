//! Engine configuration
//!
//! Loads engine-wide settings from YAML files, YAML strings or the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Default depth up to which relationships are fully embedded.
pub const DEFAULT_MAX_NEST_LEVEL: u32 = 3;

/// Default cache namespace used when a fieldset varies the namespace.
pub const DEFAULT_CACHE_NAMESPACE: &str = "jsonapi-serializer";

/// Engine-wide settings shared by every descriptor in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relationships are fully embedded while the nest level is at most this
    /// value, stubbed one level beyond, and emptied after that.
    pub max_nest_level: u32,
    /// Namespace prefix used when a fieldset augments a cache namespace and
    /// the descriptor configured none.
    pub default_cache_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nest_level: DEFAULT_MAX_NEST_LEVEL,
            default_cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse from a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse engine config")
    }

    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading engine configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Defaults overridden by environment variables
    ///
    /// - `JSONAPI_MAX_NEST_LEVEL`: embed depth
    /// - `JSONAPI_CACHE_NAMESPACE`: default cache namespace
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("JSONAPI_MAX_NEST_LEVEL") {
            config.max_nest_level = level
                .trim()
                .parse()
                .with_context(|| format!("JSONAPI_MAX_NEST_LEVEL is not a number: {level}"))?;
        }

        if let Ok(namespace) = std::env::var("JSONAPI_CACHE_NAMESPACE") {
            if !namespace.is_empty() {
                config.default_cache_namespace = namespace;
            }
        }

        Ok(config)
    }

    /// Set the embed depth.
    pub fn with_max_nest_level(mut self, level: u32) -> Self {
        self.max_nest_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_nest_level, 3);
        assert_eq!(config.default_cache_namespace, "jsonapi-serializer");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("max_nest_level: 5\n").unwrap();
        assert_eq!(config.max_nest_level, 5);
        assert_eq!(config.default_cache_namespace, DEFAULT_CACHE_NAMESPACE);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(EngineConfig::from_yaml_str("max_nest_level: deep\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_nest_level: 1").unwrap();
        writeln!(file, "default_cache_namespace: api").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config, EngineConfig::default().with_max_nest_level(1).tap_namespace("api"));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = EngineConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    impl EngineConfig {
        fn tap_namespace(mut self, namespace: &str) -> Self {
            self.default_cache_namespace = namespace.to_string();
            self
        }
    }
}
