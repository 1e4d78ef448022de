//! Extraction configuration.
//!
//! Configuration can be loaded from:
//! - A TOML file named by `ARMS_EXTRACTION_CONFIG`
//! - Environment variables (`ARMS_EXTRACTION_*`)
//!
//! # Example
//!
//! ```toml
//! [extraction]
//! enabled = true
//! base_url = "https://api.openai.com/v1"
//! api_key = "sk-..."
//! model = "gpt-4o-mini"
//! timeout_seconds = 60
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use arms_core::defaults::{
    EXTRACTION_MAX_DOCUMENT_BYTES, EXTRACTION_MODEL, EXTRACTION_TIMEOUT_SECS, EXTRACTION_URL,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for arms_core::Error {
    fn from(e: ConfigError) -> Self {
        arms_core::Error::Config(e.to_string())
    }
}

/// Settings for the OpenAI-compatible extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// When false, extraction requests fail fast and forms are filled manually.
    pub enabled: bool,
    /// Base URL of the OpenAI-compatible API (ending in `/v1`).
    pub base_url: String,
    /// API key (optional for local endpoints).
    pub api_key: Option<String>,
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Documents larger than this are refused before any request is made.
    pub max_document_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: EXTRACTION_URL.to_string(),
            api_key: None,
            model: EXTRACTION_MODEL.to_string(),
            timeout_seconds: EXTRACTION_TIMEOUT_SECS,
            max_document_bytes: EXTRACTION_MAX_DOCUMENT_BYTES,
        }
    }
}

impl ExtractionConfig {
    /// Load from the file named by `ARMS_EXTRACTION_CONFIG`, falling back to
    /// environment variables.
    pub fn load() -> ConfigResult<Self> {
        match env::var("ARMS_EXTRACTION_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path);
                info!(subsystem = "extraction", path = %path.display(), "Loading extraction config from file");
                Self::from_file(&path)
            }
            _ => {
                debug!(subsystem = "extraction", "No extraction config file, using environment variables");
                let config = Self::from_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ARMS_EXTRACTION_ENABLED` | `false` | Enable the extraction service |
    /// | `ARMS_EXTRACTION_BASE_URL` | `http://localhost:11434/v1` | API endpoint |
    /// | `ARMS_EXTRACTION_API_KEY` | (none) | Bearer token |
    /// | `ARMS_EXTRACTION_MODEL` | `gpt-4o-mini` | Chat model |
    /// | `ARMS_EXTRACTION_TIMEOUT` | `120` | Request timeout (seconds) |
    /// | `ARMS_EXTRACTION_MAX_DOCUMENT_BYTES` | `8388608` | Largest document sent |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env::var("ARMS_EXTRACTION_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.enabled),
            base_url: env::var("ARMS_EXTRACTION_BASE_URL").unwrap_or(defaults.base_url),
            api_key: env::var("ARMS_EXTRACTION_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            model: env::var("ARMS_EXTRACTION_MODEL").unwrap_or(defaults.model),
            timeout_seconds: env::var("ARMS_EXTRACTION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
            max_document_bytes: env::var("ARMS_EXTRACTION_MAX_DOCUMENT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_document_bytes),
        }
    }

    /// Load configuration from a TOML file with an `[extraction]` table.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        #[derive(Deserialize)]
        struct TomlRoot {
            #[serde(default)]
            extraction: ExtractionConfig,
        }

        let root: TomlRoot = toml::from_str(content)?;
        root.extraction.validate()?;
        Ok(root.extraction)
    }

    /// Validate the configuration. A disabled configuration is always valid.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Extraction base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Extraction model cannot be empty".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Extraction timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if self.max_document_bytes == 0 {
            return Err(ConfigError::Validation(
                "Extraction max_document_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_disabled_and_valid() {
        let config = ExtractionConfig::default();
        assert!(!config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = ExtractionConfig::from_toml(
            r#"
            [extraction]
            enabled = true
            base_url = "https://api.example.com/v1"
            api_key = "sk-test"
            model = "vision-large"
            "#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "vision-large");
        assert_eq!(config.timeout_seconds, EXTRACTION_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_toml_missing_table_uses_defaults() {
        let config = ExtractionConfig::from_toml("").unwrap();
        assert_eq!(config, ExtractionConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ExtractionConfig {
            enabled: true,
            base_url: "ftp://models".to_string(),
            ..ExtractionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ExtractionConfig {
            enabled: true,
            timeout_seconds: 0,
            ..ExtractionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_validates() {
        let err = ExtractionConfig::from_toml(
            r#"
            [extraction]
            enabled = true
            model = ""
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[extraction]\nenabled = true\nmodel = \"m\"").unwrap();
        let config = ExtractionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.model, "m");
    }

    #[test]
    fn test_from_file_missing() {
        let err = ExtractionConfig::from_file(Path::new("/nonexistent/arms.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }
}
