//! Document references and path classification.
//!
//! A record's supporting document lives in one of four places: nowhere, the
//! local staging area (`/uploaded-document/...`), the durable object store
//! (`upload/...`), or an external URL inherited from legacy data. Anything
//! else is structurally invalid and kept as [`DocumentRef::Unrecognized`] so
//! the save path can reject it explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::{DURABLE_PREFIX, STAGED_PREFIX};
use crate::{Error, Result};

/// Kind tag of a [`DocumentRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    None,
    Staged,
    Durable,
    External,
    Unrecognized,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Staged => "staged",
            Self::Durable => "durable",
            Self::External => "external",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// Where a record's supporting document currently is.
///
/// Equality compares kind and path, never identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DocumentRef {
    #[default]
    None,
    /// Local, not yet durable.
    Staged(String),
    /// Virtual path in the object store.
    Durable(String),
    /// Opaque URL not managed by this system.
    External(String),
    /// A path matching no known shape.
    Unrecognized(String),
}

impl DocumentRef {
    /// Classify a raw path string by its prefix.
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(path) = raw.map(str::trim).filter(|p| !p.is_empty()) else {
            return DocumentRef::None;
        };
        if path.starts_with(STAGED_PREFIX) {
            DocumentRef::Staged(path.to_string())
        } else if path.starts_with(DURABLE_PREFIX) {
            DocumentRef::Durable(path.to_string())
        } else if is_external_url(path) {
            DocumentRef::External(path.to_string())
        } else {
            DocumentRef::Unrecognized(path.to_string())
        }
    }

    /// Classify the document field of a record payload.
    pub fn from_value(value: Option<&JsonValue>) -> Self {
        match value {
            None | Some(JsonValue::Null) => DocumentRef::None,
            Some(JsonValue::String(s)) => Self::classify(Some(s)),
            Some(other) => DocumentRef::Unrecognized(other.to_string()),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentRef::None => DocumentKind::None,
            DocumentRef::Staged(_) => DocumentKind::Staged,
            DocumentRef::Durable(_) => DocumentKind::Durable,
            DocumentRef::External(_) => DocumentKind::External,
            DocumentRef::Unrecognized(_) => DocumentKind::Unrecognized,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            DocumentRef::None => None,
            DocumentRef::Staged(p)
            | DocumentRef::Durable(p)
            | DocumentRef::External(p)
            | DocumentRef::Unrecognized(p) => Some(p),
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, DocumentRef::Durable(_))
    }

    /// Whether a record carrying this reference may be written to the backend.
    pub fn is_persistable(&self) -> bool {
        matches!(
            self,
            DocumentRef::None | DocumentRef::Durable(_) | DocumentRef::External(_)
        )
    }

    /// JSON value written into a record payload.
    pub fn to_value(&self) -> JsonValue {
        match self.path() {
            Some(p) => JsonValue::String(p.to_string()),
            None => JsonValue::Null,
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.path() {
            Some(p) => write!(f, "{}:{}", self.kind(), p),
            None => f.write_str("none"),
        }
    }
}

/// Document sub-state of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Empty,
    BoundDurable,
    BoundStaged,
    BoundExternal,
    /// The bound path matches no known shape; saving it fails.
    Invalid,
}

impl From<&DocumentRef> for DocumentState {
    fn from(doc: &DocumentRef) -> Self {
        match doc {
            DocumentRef::None => DocumentState::Empty,
            DocumentRef::Staged(_) => DocumentState::BoundStaged,
            DocumentRef::Durable(_) => DocumentState::BoundDurable,
            DocumentRef::External(_) => DocumentState::BoundExternal,
            DocumentRef::Unrecognized(_) => DocumentState::Invalid,
        }
    }
}

fn is_external_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Validate a path returned by the durable store.
///
/// The path must carry the durable prefix and must not look like a raw URL,
/// a local/staged reference, a traversal, or a known placeholder.
pub fn validate_durable_path<S: AsRef<str>>(path: &str, sentinel_markers: &[S]) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::UploadValidation(format!(
            "{} (returned path: '{}')",
            reason, path
        )))
    };

    if path.trim().is_empty() {
        return reject("store returned an empty path");
    }
    if !path.starts_with(DURABLE_PREFIX) {
        return reject(&format!("path does not start with '{}'", DURABLE_PREFIX));
    }

    let lower = path.to_ascii_lowercase();
    for marker in ["http://", "https://", "localhost", STAGED_PREFIX] {
        if lower.contains(marker) {
            return reject(&format!("path contains '{}'", marker));
        }
    }
    if path.split('/').any(|segment| segment == "..") {
        return reject("path contains a parent-directory segment");
    }
    for marker in sentinel_markers {
        let marker = marker.as_ref().to_ascii_lowercase();
        if !marker.is_empty() && lower.contains(&marker) {
            return reject(&format!("path contains placeholder marker '{}'", marker));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SENTINEL_MARKERS;
    use serde_json::json;

    #[test]
    fn test_classify_by_prefix() {
        assert_eq!(DocumentRef::classify(None), DocumentRef::None);
        assert_eq!(DocumentRef::classify(Some("   ")), DocumentRef::None);
        assert_eq!(
            DocumentRef::classify(Some("/uploaded-document/x.pdf")),
            DocumentRef::Staged("/uploaded-document/x.pdf".into())
        );
        assert_eq!(
            DocumentRef::classify(Some("upload/Events/5_1001.pdf")),
            DocumentRef::Durable("upload/Events/5_1001.pdf".into())
        );
        assert_eq!(
            DocumentRef::classify(Some("https://legacy.example.edu/a.pdf")),
            DocumentRef::External("https://legacy.example.edu/a.pdf".into())
        );
        assert_eq!(
            DocumentRef::classify(Some("files/a.pdf")),
            DocumentRef::Unrecognized("files/a.pdf".into())
        );
    }

    #[test]
    fn test_from_value() {
        assert_eq!(DocumentRef::from_value(None), DocumentRef::None);
        assert_eq!(DocumentRef::from_value(Some(&json!(null))), DocumentRef::None);
        assert_eq!(
            DocumentRef::from_value(Some(&json!("upload/Awards/1_2.png"))),
            DocumentRef::Durable("upload/Awards/1_2.png".into())
        );
        assert_eq!(
            DocumentRef::from_value(Some(&json!(42))).kind(),
            DocumentKind::Unrecognized
        );
    }

    #[test]
    fn test_equality_is_by_kind_and_path() {
        let a = DocumentRef::Durable("upload/Events/5_1001.pdf".to_string());
        let b = DocumentRef::classify(Some("upload/Events/5_1001.pdf"));
        assert_eq!(a, b);
        assert_ne!(a, DocumentRef::External("upload/Events/5_1001.pdf".into()));
    }

    #[test]
    fn test_persistable_kinds() {
        assert!(DocumentRef::None.is_persistable());
        assert!(DocumentRef::Durable("upload/a".into()).is_persistable());
        assert!(DocumentRef::External("https://a".into()).is_persistable());
        assert!(!DocumentRef::Staged("/uploaded-document/a".into()).is_persistable());
        assert!(!DocumentRef::Unrecognized("a".into()).is_persistable());
    }

    #[test]
    fn test_to_value() {
        assert_eq!(DocumentRef::None.to_value(), JsonValue::Null);
        assert_eq!(
            DocumentRef::Durable("upload/a.pdf".into()).to_value(),
            json!("upload/a.pdf")
        );
    }

    #[test]
    fn test_serde_shape() {
        let doc = DocumentRef::Staged("/uploaded-document/x.pdf".into());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, json!({"kind": "staged", "path": "/uploaded-document/x.pdf"}));
    }

    #[test]
    fn test_state_from_ref() {
        assert_eq!(DocumentState::from(&DocumentRef::None), DocumentState::Empty);
        assert_eq!(
            DocumentState::from(&DocumentRef::Staged("/uploaded-document/a".into())),
            DocumentState::BoundStaged
        );
    }

    #[test]
    fn test_validate_accepts_canonical_path() {
        assert!(validate_durable_path("upload/Events/5_1001.pdf", SENTINEL_MARKERS).is_ok());
    }

    #[test]
    fn test_validate_rejects_poisoned_paths() {
        let poisoned = [
            "",
            "http://cdn.example.com/x.pdf",
            "https://cdn.example.com/x.pdf",
            "uploads/Events/x.pdf",
            "upload/http://cdn/x.pdf",
            "upload/localhost/x.pdf",
            "upload/Events/dummy.pdf",
            "upload/Events/placeholder_1.pdf",
            "upload/../etc/passwd",
            "/uploaded-document/x.pdf",
            "upload//uploaded-document/x.pdf",
        ];
        for path in poisoned {
            let err = validate_durable_path(path, SENTINEL_MARKERS).unwrap_err();
            assert!(
                matches!(err, Error::UploadValidation(_)),
                "expected validation error for {path:?}"
            );
        }
    }

    #[test]
    fn test_validate_sentinel_match_is_case_insensitive() {
        assert!(validate_durable_path("upload/Events/DUMMY.pdf", SENTINEL_MARKERS).is_err());
    }

    #[test]
    fn test_validate_custom_markers() {
        let markers = vec!["fixture".to_string()];
        assert!(validate_durable_path("upload/Events/fixture_1.pdf", &markers).is_err());
        assert!(validate_durable_path("upload/Events/dummy.pdf", &markers).is_ok());
    }
}
