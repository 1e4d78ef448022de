//! Extraction prompts built from a form schema.

use std::collections::BTreeMap;
use std::fmt::Write;

use arms_core::{FieldKind, FieldOption, FieldRule, FormSchema};

/// System prompt describing the response contract for one form.
///
/// `options` maps catalog keys to the options currently valid for them; enum
/// fields whose catalog is listed get their option names spelled out.
pub fn build_system_prompt(
    schema: &FormSchema,
    options: &BTreeMap<String, Vec<FieldOption>>,
) -> String {
    let mut prompt = format!(
        "You extract structured fields from a supporting document for the \"{}\" form.\n\
         Respond with a single JSON object of the form \
         {{\"fields\": {{<field name>: <value>}}, \"confidence\": <number between 0 and 1>}}.\n\
         Use null for any field the document does not state. Do not guess.\n\
         Write dates as YYYY-MM-DD.\n\nFields:\n",
        schema.form_type
    );

    for rule in &schema.fields {
        let _ = writeln!(prompt, "- {}", describe_field(rule, options));
    }
    prompt
}

/// User prompt carrying the document, or a pointer to the attached part.
pub fn build_user_prompt(filename: &str, inline_text: Option<&str>) -> String {
    match inline_text {
        Some(text) => format!(
            "Document \"{}\":\n<<<\n{}\n>>>\nExtract the fields.",
            filename, text
        ),
        None => format!("Extract the fields from the attached document \"{}\".", filename),
    }
}

fn describe_field(rule: &FieldRule, options: &BTreeMap<String, Vec<FieldOption>>) -> String {
    let hint = match &rule.kind {
        FieldKind::Text => "text".to_string(),
        FieldKind::Number {
            min,
            max,
            exclusive_min,
            integral,
        } => {
            let mut hint = if *integral { "integer" } else { "number" }.to_string();
            if let Some(min) = min {
                let op = if *exclusive_min { ">" } else { ">=" };
                let _ = write!(hint, " {} {}", op, min);
            }
            if let Some(max) = max {
                let _ = write!(hint, " <= {}", max);
            }
            hint
        }
        FieldKind::Date => "date, YYYY-MM-DD, not in the future".to_string(),
        FieldKind::Enum { .. } => {
            let names: Vec<&str> = rule
                .catalog_key()
                .and_then(|key| options.get(key))
                .map(|opts| opts.iter().map(|o| o.name.as_str()).collect())
                .unwrap_or_default();
            if names.is_empty() {
                "option name".to_string()
            } else {
                format!("one of: {}", names.join(", "))
            }
        }
        FieldKind::Bool => "true or false".to_string(),
        FieldKind::Pattern { pattern } => format!("text matching /{}/", pattern),
    };

    match &rule.label {
        Some(label) => format!("{} ({}): {}", rule.name, label, hint),
        None => format!("{}: {}", rule.name, hint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arms_core::FormRegistry;

    #[test]
    fn test_system_prompt_lists_every_field() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("events").unwrap();
        let prompt = build_system_prompt(schema, &BTreeMap::new());
        for rule in &schema.fields {
            assert!(prompt.contains(&format!("- {}", rule.name)), "missing {}", rule.name);
        }
        assert!(prompt.contains("\"events\""));
        assert!(!prompt.contains("- Image"));
    }

    #[test]
    fn test_enum_options_are_named() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("events").unwrap();
        let mut options = BTreeMap::new();
        options.insert(
            "level".to_string(),
            vec![FieldOption::new(1, "National"), FieldOption::new(2, "State")],
        );
        let prompt = build_system_prompt(schema, &options);
        assert!(prompt.contains("level (Event level): one of: National, State"));
        assert!(prompt.contains("event_type (Event type): option name"));
    }

    #[test]
    fn test_number_hints() {
        let registry = FormRegistry::builtin();
        let schema = registry.get("events").unwrap();
        let prompt = build_system_prompt(schema, &BTreeMap::new());
        assert!(prompt.contains("participants (Number of participants): integer > 0"));
    }

    #[test]
    fn test_user_prompt_inline_and_attached() {
        assert!(build_user_prompt("a.txt", Some("hello")).contains("<<<\nhello\n>>>"));
        assert!(build_user_prompt("a.pdf", None).contains("attached document \"a.pdf\""));
    }
}
