//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::query::{ParseOptions, DEFAULT_MAX_DEPTH};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parser limits
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Longest accepted query in bytes; unlimited when absent
    #[serde(default)]
    pub max_query_length: Option<usize>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_query_length: None,
        }
    }
}

/// CLI output configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load an explicitly named file, or fall back to the default locations
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Candidate config files, highest priority first
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("nrql").join("config.toml")),
            Some(PathBuf::from("/etc/nrql/config.toml")),
            Some(PathBuf::from("./nrql.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Parser options derived from the `[parser]` section
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.parser.max_depth,
            max_query_length: self.parser.max_query_length.unwrap_or(usize::MAX),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key/value source
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Parser overrides
        if let Some(depth) = var("NRQL_MAX_DEPTH").and_then(|v| v.parse().ok()) {
            if depth > 0 {
                self.parser.max_depth = depth;
            }
        }
        if let Some(length) = var("NRQL_MAX_QUERY_LENGTH").and_then(|v| v.parse().ok()) {
            self.parser.max_query_length = Some(length);
        }

        // Output overrides
        if let Some(pretty) = var("NRQL_OUTPUT_PRETTY").and_then(|v| parse_bool(&v)) {
            self.output.pretty = pretty;
        }

        // Logging overrides
        if let Some(level) = var("NRQL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("NRQL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.parser.max_depth == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                error: "parser.max_depth must be at least 1".to_string(),
            });
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                error: format!(
                    "logging.format must be \"pretty\" or \"json\", got {:?}",
                    self.logging.format
                ),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid config file {path:?}: {error}")]
    Invalid { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# nrql Configuration
#
# Environment variables override these settings:
# - NRQL_MAX_DEPTH
# - NRQL_MAX_QUERY_LENGTH
# - NRQL_OUTPUT_PRETTY
# - NRQL_LOG_LEVEL
# - NRQL_LOG_FORMAT

[parser]
# Deepest allowed nesting of parentheses, calls and prefix operators
max_depth = 64

# Longest accepted query in bytes (unlimited when unset)
# max_query_length = 4096

[output]
# Pretty-print JSON output
pretty = true

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_parses() {
        let file = write_config(&generate_default_config());
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = write_config("[parser]\nmax_query_length = 100\n");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.parser.max_query_length, Some(100));
        assert!(config.output.pretty);
        assert_eq!(config.logging.format, "pretty");

        let options = config.parse_options();
        assert_eq!(options.max_query_length, 100);
    }

    #[test]
    fn test_unlimited_query_length() {
        let options = Config::default().parse_options();
        assert_eq!(options, ParseOptions::default());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        let file = write_config("[parser\nmax_depth = 3");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let file = write_config("[parser]\nmax_depth = 0\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid { .. })
        ));

        let file = write_config("[logging]\nformat = \"xml\"\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NRQL_MAX_DEPTH", "8"),
            ("NRQL_MAX_QUERY_LENGTH", "512"),
            ("NRQL_OUTPUT_PRETTY", "false"),
            ("NRQL_LOG_LEVEL", "debug"),
            ("NRQL_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.parser.max_depth, 8);
        assert_eq!(config.parser.max_query_length, Some(512));
        assert!(!config.output.pretty);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_unparseable_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "NRQL_MAX_DEPTH" => Some("deep".to_string()),
            "NRQL_OUTPUT_PRETTY" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }
}
