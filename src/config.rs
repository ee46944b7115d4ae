//! Bridge configuration (`vtbridge.toml`)

use crate::error::{InteropError, Result};
use crate::logging::{parse_level, LogConfig, LogFormat, LogOutput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "vtbridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub lookup: LookupKind,

    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormatName,

    /// Log file; stderr when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default = "default_false")]
    pub spans: bool,

    /// Extra filter directives, comma separated
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatName {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Sizing of each wrapper's `DefaultCaching`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub initial_capacity: usize,

    /// Rounded up to a power of two, minimum 2
    #[serde(default = "default_shards")]
    pub shard_amount: usize,
}

/// Which `InterfaceDetailsLookup` new wrappers use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    #[default]
    Registry,
    Sorted,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormatName::default(),
            file: None,
            spans: false,
            filter: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_capacity(),
            shard_amount: default_shards(),
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_false() -> bool { false }
fn default_capacity() -> usize { 4 }
fn default_shards() -> usize { 4 }

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| InteropError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| InteropError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Find `vtbridge.toml` in the current directory or its parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Defaults with `VTBRIDGE_LOG_*` applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `VTBRIDGE_LOG_LEVEL`, `VTBRIDGE_LOG_FILE`, `VTBRIDGE_LOG_JSON`
    /// and `VTBRIDGE_LOG_SPANS`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("VTBRIDGE_LOG_LEVEL") {
            if parse_level(&level).is_some() {
                self.logging.level = level.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("VTBRIDGE_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(path));
        }
        if std::env::var("VTBRIDGE_LOG_JSON").is_ok() {
            self.logging.format = LogFormatName::Json;
        }
        if std::env::var("VTBRIDGE_LOG_SPANS").is_ok() {
            self.logging.spans = true;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if parse_level(&self.logging.level).is_none() {
            return Err(InteropError::Config(format!(
                "unknown log level `{}`",
                self.logging.level
            )));
        }
        if self.cache.shard_amount == 0 {
            return Err(InteropError::Config("cache.shard_amount must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn to_log_config(&self) -> LogConfig {
        let mut config = LogConfig::default()
            .with_format(match self.logging.format {
                LogFormatName::Pretty => LogFormat::Pretty,
                LogFormatName::Compact => LogFormat::Compact,
                LogFormatName::Json => LogFormat::Json,
            })
            .with_span_events(self.logging.spans);

        if let Some(level) = parse_level(&self.logging.level) {
            config = config.with_level(level);
        }
        if let Some(path) = &self.logging.file {
            config = config.with_output(LogOutput::File(path.clone()));
        }
        if let Some(filter) = &self.logging.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }

    /// Default configuration as TOML
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| InteropError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| InteropError::Config(format!("failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cache.initial_capacity, 4);
        assert_eq!(config.lookup, LookupKind::Registry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
lookup = "sorted"

[logging]
level = "debug"
format = "json"
spans = true

[cache]
initial_capacity = 16
shard_amount = 8
"#;
        let config = BridgeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.lookup, LookupKind::Sorted);
        assert_eq!(config.logging.format, LogFormatName::Json);
        assert!(config.logging.spans);
        assert_eq!(config.cache.initial_capacity, 16);
        assert_eq!(config.cache.shard_amount, 8);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("[cache]\ninitial_capacity = 1\n").unwrap();
        assert_eq!(config.cache.initial_capacity, 1);
        assert_eq!(config.cache.shard_amount, 4);
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BridgeConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, InteropError::Config(_)));

        let err = BridgeConfig::from_toml_str("[cache]\nshard_amount = 0\n").unwrap_err();
        assert!(matches!(err, InteropError::Config(_)));

        assert!(BridgeConfig::from_toml_str("lookup = \"hashed\"").is_err());
    }

    #[test]
    fn test_to_log_config() {
        let mut config = BridgeConfig::default();
        config.logging.level = "warn".to_string();
        config.logging.format = LogFormatName::Pretty;
        config.logging.file = Some(PathBuf::from("bridge.log"));

        let log = config.to_log_config();
        assert_eq!(log.level, Level::WARN);
        assert_eq!(log.format, LogFormat::Pretty);
        assert_eq!(log.output, LogOutput::File(PathBuf::from("bridge.log")));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = BridgeConfig::default();
        config.lookup = LookupKind::Sorted;
        config.cache.shard_amount = 16;
        config.save(&path).unwrap();

        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_generate_default_parses() {
        let text = BridgeConfig::generate_default();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), BridgeConfig::default());
    }
}
