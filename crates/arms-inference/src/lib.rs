//! # arms-inference
//!
//! Extraction services for the ARMS document lifecycle.
//!
//! This crate provides:
//! - An OpenAI-compatible chat-completions extractor that turns a staged
//!   document into best-effort field values for a form
//! - Prompt construction from a form schema and its option catalogs
//! - Tolerant parsing of model output into an `ExtractedFieldSet`
//! - A disabled extractor for deployments without a model
//! - Configuration from environment variables or a TOML file
//!
//! # Feature Flags
//!
//! - `mock`: Enable `MockExtractionService` for downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use arms_inference::{build_extractor, ExtractionConfig};
//!
//! let config = ExtractionConfig::load().expect("Failed to load config");
//! let extractor = build_extractor(&config, None).expect("Failed to build extractor");
//! ```

pub mod config;
pub mod disabled;
pub mod openai;
pub mod parse;
pub mod prompt;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::sync::Arc;

// Re-export core types
pub use arms_core::*;

pub use config::{ConfigError, ConfigResult, ExtractionConfig};
pub use disabled::DisabledExtractionService;
pub use openai::LlmExtractionService;
pub use parse::parse_extraction;
pub use prompt::{build_system_prompt, build_user_prompt};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockExtractionService;

/// Build the extraction service described by a configuration.
///
/// A disabled configuration yields [`DisabledExtractionService`]; otherwise
/// the OpenAI-compatible extractor, optionally listing dropdown options from
/// `catalog` in its prompts.
pub fn build_extractor(
    config: &ExtractionConfig,
    catalog: Option<Arc<dyn OptionCatalog>>,
) -> Result<Arc<dyn ExtractionService>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledExtractionService));
    }
    let mut service = LlmExtractionService::new(config.clone())?;
    if let Some(catalog) = catalog {
        service = service.with_catalog(catalog);
    }
    Ok(Arc::new(service))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_disabled_extractor() {
        let config = ExtractionConfig {
            enabled: false,
            ..ExtractionConfig::default()
        };
        let extractor = build_extractor(&config, None).unwrap();
        assert_eq!(extractor.name(), "disabled");
    }

    #[test]
    fn test_build_llm_extractor() {
        let config = ExtractionConfig {
            enabled: true,
            ..ExtractionConfig::default()
        };
        let extractor = build_extractor(&config, None).unwrap();
        assert_eq!(extractor.name(), config.model);
    }
}
