//! Mock extraction service for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arms_inference::mock::MockExtractionService;
//! use serde_json::json;
//!
//! let service = MockExtractionService::new()
//!     .with_response("events", [("title", json!("AI Summit"))], 0.9);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use arms_core::{Error, ExtractedFieldSet, ExtractionService, FormSchema, Result, StagedFile};

/// Mock extraction service returning canned field sets per form type.
#[derive(Clone, Default)]
pub struct MockExtractionService {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    responses: HashMap<String, ExtractedFieldSet>,
    failure: Option<String>,
    latency_ms: u64,
}

/// One recorded extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub form_type: String,
    pub filename: String,
}

impl MockExtractionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned result for a form type.
    pub fn with_response<I, K>(mut self, form_type: &str, fields: I, confidence: f64) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let fields: BTreeMap<String, JsonValue> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Arc::make_mut(&mut self.config)
            .responses
            .insert(form_type.to_string(), ExtractedFieldSet::new(fields, confidence));
        self
    }

    /// Fail every call with this message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    /// Set simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl ExtractionService for MockExtractionService {
    async fn extract(&self, document: &StagedFile, schema: &FormSchema) -> Result<ExtractedFieldSet> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                form_type: schema.form_type.clone(),
                filename: document.filename.clone(),
            });
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if let Some(message) = &self.config.failure {
            return Err(Error::Extraction(message.clone()));
        }

        Ok(self
            .config
            .responses
            .get(&schema.form_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.failure.is_none())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
