use crate::log::{Level, Log, Topic};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Defaults
///

mod defaults {
    use crate::log::{DEFAULT_LOG_CAPACITY, Level};

    pub const fn log_level() -> Level {
        Level::Info
    }

    pub const fn log_max_entries() -> usize {
        DEFAULT_LOG_CAPACITY
    }
}

pub const MAX_LOG_ENTRIES: usize = 1_000_000;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// TOML could not be parsed into the expected structure.
    #[error("toml error: {0}")]
    CannotParseToml(String),

    #[error(transparent)]
    ConfigSchema(#[from] ConfigSchemaError),
}

///
/// ConfigSchemaError
///

#[derive(Debug, ThisError)]
pub enum ConfigSchemaError {
    #[error("validation error: {0}")]
    ValidationError(String),
}

///
/// Validate
///

pub trait Validate {
    fn validate(&self) -> Result<(), ConfigSchemaError>;
}

///
/// LogConfig
///

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "defaults::log_level")]
    pub level: Level,

    #[serde(default = "defaults::log_max_entries")]
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            max_entries: defaults::log_max_entries(),
        }
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.max_entries == 0 {
            return Err(ConfigSchemaError::ValidationError(
                "log.max_entries must be at least 1".to_string(),
            ));
        }

        if self.max_entries > MAX_LOG_ENTRIES {
            return Err(ConfigSchemaError::ValidationError(format!(
                "log.max_entries {} exceeds max {}",
                self.max_entries, MAX_LOG_ENTRIES
            )));
        }

        Ok(())
    }
}

///
/// CompactionConfig
///
/// Which representation wrappers keep after the layer compacts them. With
/// both flags false the encoded form wins.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompactionConfig {
    #[serde(default)]
    pub retain_decoded: bool,

    #[serde(default)]
    pub retain_encoded: bool,
}

///
/// CacheConfig
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,
}

impl CacheConfig {
    /// Parse and validate a TOML configuration document.
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(document).map_err(|err| ConfigError::CannotParseToml(err.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Apply the log settings to the process-wide log state.
    pub fn apply(&self) {
        Log::set_level(self.log.level);
        Log::set_capacity(self.log.max_entries);

        crate::log!(
            Topic::Config,
            Debug,
            "configured: log level {}, {} log entries",
            self.log.level,
            self.log.max_entries,
        );
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        self.log.validate()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::DEFAULT_LOG_CAPACITY;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CacheConfig::from_toml("").unwrap();

        assert_eq!(config.log.level, Level::Info);
        assert_eq!(config.log.max_entries, DEFAULT_LOG_CAPACITY);
        assert!(!config.compaction.retain_decoded);
        assert!(!config.compaction.retain_encoded);
    }

    #[test]
    fn documents_round_trip() {
        let document = r#"
            [log]
            level = "trace"
            max_entries = 128

            [compaction]
            retain_decoded = true
        "#;

        let config = CacheConfig::from_toml(document).unwrap();
        assert_eq!(config.log.level, Level::Trace);
        assert_eq!(config.log.max_entries, 128);
        assert!(config.compaction.retain_decoded);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            CacheConfig::from_toml("[log]\nvolume = 11"),
            Err(ConfigError::CannotParseToml(_))
        ));
    }

    #[test]
    fn zero_log_capacity_fails_validation() {
        assert!(matches!(
            CacheConfig::from_toml("[log]\nmax_entries = 0"),
            Err(ConfigError::ConfigSchema(_))
        ));
    }
}
