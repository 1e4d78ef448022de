/// Checks that the built-in form schemas stay consistent with the document
/// path conventions and with the reconciliation rule descriptors.
///
/// Every built-in form must:
/// - use the default `Image` document field
/// - place documents under a non-empty category without path separators
/// - declare only rule descriptors that serialize back to the same shape
use arms_core::{FieldKind, FormRegistry, FormSchema};

#[test]
fn test_builtin_forms_use_default_document_field() {
    let registry = FormRegistry::builtin();
    for schema in registry.list() {
        assert_eq!(
            schema.document_field, "Image",
            "form '{}' should use the Image document field",
            schema.form_type
        );
    }
}

#[test]
fn test_builtin_categories_are_single_segments() {
    let registry = FormRegistry::builtin();
    for schema in registry.list() {
        let category = schema.category();
        assert!(!category.is_empty());
        assert!(
            !category.contains('/'),
            "category '{}' must be a single path segment",
            category
        );
    }
}

#[test]
fn test_builtin_field_names_are_unique() {
    let registry = FormRegistry::builtin();
    for schema in registry.list() {
        let mut names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate field in '{}'", schema.form_type);
        assert!(
            schema.rule(&schema.document_field).is_none(),
            "document field must not be a reconciled field in '{}'",
            schema.form_type
        );
    }
}

#[test]
fn test_builtin_patterns_compile_as_regex_source() {
    let registry = FormRegistry::builtin();
    let publications = registry.get("publications").expect("publications form");
    let patterns: Vec<&str> = publications
        .fields
        .iter()
        .filter_map(|f| match &f.kind {
            FieldKind::Pattern { pattern } => Some(pattern.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(patterns.len(), 2);
    assert!(patterns.iter().all(|p| p.starts_with('^') && p.ends_with('$')));
}

#[test]
fn test_builtin_schemas_round_trip_through_json() {
    let registry = FormRegistry::builtin();
    for schema in registry.list() {
        let json = serde_json::to_value(schema).expect("serialize schema");
        let back: FormSchema = serde_json::from_value(json).expect("deserialize schema");
        assert_eq!(&back, schema);
    }
}
