//! In-memory option catalog.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::FieldOption;
use crate::traits::OptionCatalog;
use crate::Result;

/// Option catalog backed by a fixed map, for per-form option sets supplied by
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticOptionCatalog {
    options: HashMap<String, Vec<FieldOption>>,
}

impl StaticOptionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the options for a catalog key, replacing any previous set.
    pub fn with_options(mut self, key: impl Into<String>, options: Vec<FieldOption>) -> Self {
        self.options.insert(key.into(), options);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, options: Vec<FieldOption>) {
        self.options.insert(key.into(), options);
    }
}

#[async_trait]
impl OptionCatalog for StaticOptionCatalog {
    async fn options(&self, key: &str) -> Result<Vec<FieldOption>> {
        Ok(self.options.get(key).cloned().unwrap_or_default())
    }
}
