//! Form schemas: record kinds and the per-field rule descriptors that drive
//! extraction prompts and reconciliation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defaults::DOCUMENT_FIELD;
use crate::{Error, Result};

/// ARMS record entities that carry a supporting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Event,
    Publication,
    Award,
    ResearchContribution,
    DepartmentProfile,
    Funding,
    Activity,
}

impl RecordKind {
    /// Durable category folder for documents of this kind.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Event => "Events",
            Self::Publication => "Publications",
            Self::Award => "Awards",
            Self::ResearchContribution => "Research",
            Self::DepartmentProfile => "Departments",
            Self::Funding => "Funding",
            Self::Activity => "Activities",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Publication => "publication",
            Self::Award => "award",
            Self::ResearchContribution => "research_contribution",
            Self::DepartmentProfile => "department_profile",
            Self::Funding => "funding",
            Self::Activity => "activity",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "event" => Ok(Self::Event),
            "publication" => Ok(Self::Publication),
            "award" => Ok(Self::Award),
            "research_contribution" => Ok(Self::ResearchContribution),
            "department_profile" => Ok(Self::DepartmentProfile),
            "funding" => Ok(Self::Funding),
            "activity" => Ok(Self::Activity),
            _ => Err(Error::InvalidInput(format!("Unknown record kind: {}", s))),
        }
    }
}

/// Type and constraints of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, trimmed.
    Text,
    /// Finite number within optional bounds.
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        /// `min` itself is rejected.
        #[serde(default)]
        exclusive_min: bool,
        #[serde(default)]
        integral: bool,
    },
    /// Calendar date, never in the future.
    Date,
    /// Dropdown backed by an option catalog.
    Enum {
        /// Catalog key; defaults to the field name.
        #[serde(default)]
        catalog: Option<String>,
    },
    Bool,
    /// Text that must match a regular expression.
    Pattern { pattern: String },
}

impl FieldKind {
    /// Integral count strictly greater than zero.
    pub fn positive_count() -> Self {
        FieldKind::Number {
            min: Some(0.0),
            max: None,
            exclusive_min: true,
            integral: true,
        }
    }

    /// Amount strictly greater than zero.
    pub fn positive_amount() -> Self {
        FieldKind::Number {
            min: Some(0.0),
            max: None,
            exclusive_min: true,
            integral: false,
        }
    }

    pub fn dropdown() -> Self {
        FieldKind::Enum { catalog: None }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        FieldKind::Pattern {
            pattern: pattern.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number { .. } => "number",
            FieldKind::Date => "date",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Bool => "bool",
            FieldKind::Pattern { .. } => "pattern",
        }
    }
}

/// Rule descriptor for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Human-readable label used in extraction prompts.
    #[serde(default)]
    pub label: Option<String>,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Option catalog key for enum fields.
    pub fn catalog_key(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Enum { catalog } => Some(catalog.as_deref().unwrap_or(&self.name)),
            _ => None,
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

fn default_document_field() -> String {
    DOCUMENT_FIELD.to_string()
}

/// Per-form descriptor: which record it produces and how each field is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub form_type: String,
    pub kind: RecordKind,
    #[serde(default = "default_document_field")]
    pub document_field: String,
    pub fields: Vec<FieldRule>,
}

impl FormSchema {
    pub fn new(form_type: impl Into<String>, kind: RecordKind, fields: Vec<FieldRule>) -> Self {
        Self {
            form_type: form_type.into(),
            kind,
            document_field: default_document_field(),
            fields,
        }
    }

    pub fn with_document_field(mut self, field: impl Into<String>) -> Self {
        self.document_field = field.into();
        self
    }

    pub fn category(&self) -> &'static str {
        self.kind.category()
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|r| r.name == name)
    }

    /// Catalog keys of every enum field, deduplicated.
    pub fn catalog_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.fields.iter().filter_map(|r| r.catalog_key()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

/// Lookup of form schemas by form type.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    schemas: BTreeMap<String, FormSchema>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard ARMS forms.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(schema);
        }
        registry
    }

    /// Register a schema. Replaces any schema with the same form type.
    pub fn register(&mut self, schema: FormSchema) {
        self.schemas.insert(schema.form_type.clone(), schema);
    }

    pub fn get(&self, form_type: &str) -> Result<&FormSchema> {
        self.schemas
            .get(form_type)
            .ok_or_else(|| Error::NotFound(format!("Form type '{}' not registered", form_type)))
    }

    pub fn list(&self) -> Vec<&FormSchema> {
        self.schemas.values().collect()
    }
}

fn builtin_schemas() -> Vec<FormSchema> {
    vec![
        FormSchema::new(
            "events",
            RecordKind::Event,
            vec![
                FieldRule::new("title", FieldKind::Text).with_label("Event title"),
                FieldRule::new("organizer", FieldKind::Text).with_label("Organizing body"),
                FieldRule::new("venue", FieldKind::Text),
                FieldRule::new("event_date", FieldKind::Date).with_label("Event date"),
                FieldRule::new("level", FieldKind::dropdown()).with_label("Event level"),
                FieldRule::new("event_type", FieldKind::dropdown()).with_label("Event type"),
                FieldRule::new("participants", FieldKind::positive_count())
                    .with_label("Number of participants"),
                FieldRule::new("is_international", FieldKind::Bool),
            ],
        ),
        FormSchema::new(
            "publications",
            RecordKind::Publication,
            vec![
                FieldRule::new("title", FieldKind::Text).with_label("Paper title"),
                FieldRule::new("journal", FieldKind::Text).with_label("Journal or conference"),
                FieldRule::new("publication_date", FieldKind::Date),
                FieldRule::new("doi", FieldKind::pattern(r"^10\.\d{4,9}/\S+$")).with_label("DOI"),
                FieldRule::new("issn", FieldKind::pattern(r"^\d{4}-\d{3}[\dXx]$"))
                    .with_label("ISSN"),
                FieldRule::new("indexing", FieldKind::dropdown()).with_label("Indexed in"),
                FieldRule::new("author_count", FieldKind::positive_count()),
                FieldRule::new("is_peer_reviewed", FieldKind::Bool),
            ],
        ),
        FormSchema::new(
            "funding",
            RecordKind::Funding,
            vec![
                FieldRule::new("project_title", FieldKind::Text),
                FieldRule::new("agency", FieldKind::Text).with_label("Funding agency"),
                FieldRule::new("amount", FieldKind::positive_amount())
                    .with_label("Sanctioned amount"),
                FieldRule::new("sanction_date", FieldKind::Date),
                FieldRule::new("funding_type", FieldKind::dropdown()),
                FieldRule::new(
                    "status",
                    FieldKind::Enum {
                        catalog: Some("project_status".to_string()),
                    },
                ),
                FieldRule::new("duration_months", FieldKind::positive_count()),
            ],
        ),
        FormSchema::new(
            "awards",
            RecordKind::Award,
            vec![
                FieldRule::new("award_name", FieldKind::Text),
                FieldRule::new("awarding_body", FieldKind::Text),
                FieldRule::new("award_date", FieldKind::Date),
                FieldRule::new("level", FieldKind::dropdown()),
                FieldRule::new(
                    "amount",
                    FieldKind::Number {
                        min: Some(0.0),
                        max: None,
                        exclusive_min: false,
                        integral: false,
                    },
                ),
            ],
        ),
    ]
}
