//! Extraction service for deployments without a model.

use async_trait::async_trait;

use arms_core::{Error, ExtractedFieldSet, ExtractionService, FormSchema, Result, StagedFile};

/// Extractor that always fails with a non-fatal extraction error.
///
/// Forms stay fully usable manually.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledExtractionService;

#[async_trait]
impl ExtractionService for DisabledExtractionService {
    async fn extract(&self, _document: &StagedFile, schema: &FormSchema) -> Result<ExtractedFieldSet> {
        Err(Error::Extraction(format!(
            "Extraction is disabled; fill the {} form manually",
            schema.form_type
        )))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arms_core::FormRegistry;

    #[tokio::test]
    async fn test_disabled_extraction_is_non_fatal() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("awards").unwrap();
        let doc = StagedFile::new("a.pdf", "application/pdf", b"%PDF".to_vec());
        let err = DisabledExtractionService.extract(&doc, schema).await.unwrap_err();
        assert!(!err.is_fatal_to_save());
        assert!(!DisabledExtractionService.health_check().await.unwrap());
    }
}
