// src/config.rs - Controller configuration

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable controller behavior. Plain data: the searchable-fields projection
/// and the initial comparator are code and are supplied through the
/// controller's builder methods instead.
///
/// Every numeric/boolean option can also be changed at runtime through the
/// controller's setters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Quiet period before a debounced query is evaluated, in milliseconds.
    /// Zero evaluates immediately.
    pub debounce_ms: u64,
    pub case_sensitive: bool,
    /// Non-empty queries shorter than this (trimmed) are not applied.
    pub min_query_len: usize,
    /// Page size for online fetches; a page shorter than this signals the
    /// last page.
    pub page_size: usize,
    pub cache_enabled: bool,
    /// Entry bound for the online result cache.
    pub max_cache_size: usize,
    pub fuzzy_enabled: bool,
    /// Minimum fuzzy score (0..1) an item must reach to stay visible.
    pub fuzzy_threshold: f64,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            case_sensitive: false,
            min_query_len: 1,
            page_size: 20,
            cache_enabled: true,
            max_cache_size: 16,
            fuzzy_enabled: false,
            fuzzy_threshold: 0.3,
        }
    }
}

impl SiftConfig {
    /// Load configuration from a TOML file. Missing keys fall back to their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SiftConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SiftConfig::default();
        assert_eq!(config.debounce_ms, 300);
        assert!(!config.case_sensitive);
        assert_eq!(config.min_query_len, 1);
        assert_eq!(config.page_size, 20);
        assert!(config.cache_enabled);
        assert!(!config.fuzzy_enabled);
    }

    #[test]
    fn test_from_file_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size = 5\nfuzzy_enabled = true").unwrap();

        let config = SiftConfig::from_file(file.path()).unwrap();
        assert_eq!(config.page_size, 5);
        assert!(config.fuzzy_enabled);
        // Unspecified keys keep their defaults
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn test_from_file_invalid_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size = \"not a number\"").unwrap();

        assert!(matches!(
            SiftConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            SiftConfig::from_file(Path::new("/nonexistent/sift.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
