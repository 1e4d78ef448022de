//! Parsing of model output into an [`ExtractedFieldSet`].
//!
//! Models wrap JSON in code fences or prose often enough that the parser
//! looks for the outermost object instead of trusting the raw text.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use arms_core::{Error, ExtractedFieldSet, FormSchema, Result};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid code fence regex"));

/// Confidence assumed when the model omits it.
const IMPLIED_CONFIDENCE: f64 = 1.0;

/// Parse a model response for `schema`.
///
/// Accepts `{"fields": {...}, "confidence": x}` or a flat object of field
/// values. Names not in the schema, and the document field, are dropped.
pub fn parse_extraction(raw: &str, schema: &FormSchema) -> Result<ExtractedFieldSet> {
    let body = json_body(raw)
        .ok_or_else(|| Error::Extraction("Model response contained no JSON object".to_string()))?;
    let value: JsonValue = serde_json::from_str(body)
        .map_err(|e| Error::Extraction(format!("Model response is not valid JSON: {}", e)))?;
    let JsonValue::Object(mut root) = value else {
        return Err(Error::Extraction(
            "Model response is not a JSON object".to_string(),
        ));
    };

    let confidence = root
        .remove("confidence")
        .and_then(|c| c.as_f64())
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(IMPLIED_CONFIDENCE);

    let raw_fields: Map<String, JsonValue> = match root.remove("fields") {
        Some(JsonValue::Object(fields)) => fields,
        Some(_) => {
            return Err(Error::Extraction(
                "Model response 'fields' is not an object".to_string(),
            ))
        }
        None => root,
    };

    let fields: BTreeMap<String, JsonValue> = raw_fields
        .into_iter()
        .filter(|(name, _)| name != &schema.document_field && schema.rule(name).is_some())
        .collect();

    Ok(ExtractedFieldSet::new(fields, confidence))
}

fn json_body(raw: &str) -> Option<&str> {
    let text = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use arms_core::FormRegistry;
    use serde_json::json;

    fn events() -> FormSchema {
        FormRegistry::builtin().get("events").unwrap().clone()
    }

    #[test]
    fn test_parse_wrapped_response() {
        let set = parse_extraction(
            r#"{"fields": {"title": "AI Summit", "level": 2}, "confidence": 0.82}"#,
            &events(),
        )
        .unwrap();
        assert_eq!(set.fields["title"], json!("AI Summit"));
        assert_eq!(set.fields["level"], json!(2));
        assert!((set.confidence - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_fenced_response_with_prose() {
        let raw = "Here you go:\n```json\n{\"fields\": {\"venue\": \"Hall A\"}}\n```\nDone.";
        let set = parse_extraction(raw, &events()).unwrap();
        assert_eq!(set.fields["venue"], json!("Hall A"));
        assert_eq!(set.confidence, IMPLIED_CONFIDENCE);
    }

    #[test]
    fn test_parse_flat_object() {
        let set = parse_extraction(
            r#"{"title": "Expo", "confidence": 3.0, "participants": 40}"#,
            &events(),
        )
        .unwrap();
        assert_eq!(set.fields.len(), 2);
        assert_eq!(set.confidence, 1.0);
    }

    #[test]
    fn test_unknown_and_document_fields_dropped() {
        let set = parse_extraction(
            r#"{"fields": {"title": "x", "Image": "upload/Events/1_1.pdf", "ceo": "y"}}"#,
            &events(),
        )
        .unwrap();
        assert_eq!(set.fields.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_no_json_is_extraction_error() {
        let err = parse_extraction("I could not read the document.", &events()).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_fields_not_object_is_error() {
        let err = parse_extraction(r#"{"fields": ["title"]}"#, &events()).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
