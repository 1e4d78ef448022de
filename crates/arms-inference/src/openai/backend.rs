//! OpenAI-compatible extraction service implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, info, warn};

use arms_core::defaults::EXTRACTION_TEXT_CHARS;
use arms_core::file_safety::is_textual;
use arms_core::{
    Error, ExtractedFieldSet, ExtractionService, FieldOption, FormSchema, OptionCatalog, Result,
    StagedFile,
};

use super::error::{to_extraction_error, ProviderErrorCode};
use super::types::*;
use crate::config::ExtractionConfig;
use crate::parse::parse_extraction;
use crate::prompt::{build_system_prompt, build_user_prompt};

/// Extraction service backed by an OpenAI-compatible chat model.
pub struct LlmExtractionService {
    client: Client,
    config: ExtractionConfig,
    catalog: Option<Arc<dyn OptionCatalog>>,
}

impl LlmExtractionService {
    /// Create a new service with the given configuration.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "extraction",
            base_url = %config.base_url,
            model = %config.model,
            "Initializing extraction service"
        );

        Ok(Self {
            client,
            config,
            catalog: None,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ExtractionConfig::from_env())
    }

    /// List dropdown options from `catalog` in prompts.
    pub fn with_catalog(mut self, catalog: Arc<dyn OptionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// Build a GET request with authentication.
    fn build_get_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.get(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req
    }

    async fn load_options(&self, schema: &FormSchema) -> BTreeMap<String, Vec<FieldOption>> {
        let mut options = BTreeMap::new();
        let Some(catalog) = &self.catalog else {
            return options;
        };
        for key in schema.catalog_keys() {
            match catalog.options(key).await {
                Ok(list) => {
                    options.insert(key.to_string(), list);
                }
                Err(e) => {
                    // Prompt still works without names; reconciliation enforces membership.
                    warn!(subsystem = "extraction", catalog = key, error = %e, "Option lookup failed");
                }
            }
        }
        options
    }

    /// User message for a document, chosen by content type.
    fn user_message(&self, document: &StagedFile) -> MessageContent {
        if is_textual(&document.content_type) {
            let text = String::from_utf8_lossy(&document.data);
            let text: String = text.chars().take(EXTRACTION_TEXT_CHARS).collect();
            return MessageContent::Text(build_user_prompt(&document.filename, Some(&text)));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&document.data);
        let data_url = format!("data:{};base64,{}", document.content_type, encoded);
        let attachment = if document.content_type.starts_with("image/") {
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            }
        } else {
            ContentPart::File {
                file: FileData {
                    filename: document.filename.clone(),
                    file_data: data_url,
                },
            }
        };

        MessageContent::Parts(vec![
            ContentPart::Text {
                text: build_user_prompt(&document.filename, None),
            },
            attachment,
        ])
    }
}

#[async_trait]
impl ExtractionService for LlmExtractionService {
    async fn extract(
        &self,
        document: &StagedFile,
        schema: &FormSchema,
    ) -> Result<ExtractedFieldSet> {
        if document.size() > self.config.max_document_bytes {
            return Err(Error::Extraction(format!(
                "Document is {} bytes, limit is {}",
                document.size(),
                self.config.max_document_bytes
            )));
        }

        let start = Instant::now();
        let options = self.load_options(schema).await;
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(build_system_prompt(schema, &options)),
                ChatMessage::user(self.user_message(document)),
            ],
            temperature: Some(0.0),
            response_format: Some(ResponseFormat::json_object()),
            stream: false,
        };

        debug!(
            subsystem = "extraction",
            op = "extract",
            form_type = %schema.form_type,
            content_type = %document.content_type,
            size_bytes = document.size(),
            model = %self.config.model,
            "Sending extraction request"
        );

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Option<ProviderErrorResponse> = response.json().await.ok();
            let (message, error_type) = body
                .map(|b| (b.error.message, b.error.error_type))
                .unwrap_or_else(|| (status.to_string(), String::new()));
            let code = ProviderErrorCode::from_response(status.as_u16(), &error_type);
            return Err(to_extraction_error(code, &message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Extraction("Model returned an empty response".to_string()))?;

        let fields = parse_extraction(&content, schema)?;
        info!(
            subsystem = "extraction",
            op = "extract",
            form_type = %schema.form_type,
            field_count = fields.fields.len(),
            confidence = fields.confidence,
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction completed"
        );
        Ok(fields)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.build_get_request("/models").send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
