//! Error types for the ARMS document lifecycle.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using ARMS's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ARMS operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store transport failed outright
    #[error("Document upload failed: {0}")]
    Upload(String),

    /// Durable store returned a malformed or placeholder path
    #[error("Document upload returned an unusable path: {0}")]
    UploadValidation(String),

    /// Document reference is in a shape the lifecycle does not recognize
    #[error("Invalid document path: {0}")]
    InvalidDocumentPath(String),

    /// Record policy requires a document and none was resolved
    #[error("Document required: {0}")]
    DocumentRequired(String),

    /// Extraction call failed or returned unusable data
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable machine-readable error codes.
///
/// Serialized into API error bodies so callers can branch on the failed step
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UploadFailed,
    UploadValidation,
    InvalidDocumentPath,
    DocumentRequired,
    ExtractionFailed,
    Database,
    NotFound,
    Serialization,
    Config,
    InvalidInput,
    Request,
    Internal,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadFailed => "upload_failed",
            Self::UploadValidation => "upload_validation",
            Self::InvalidDocumentPath => "invalid_document_path",
            Self::DocumentRequired => "document_required",
            Self::ExtractionFailed => "extraction_failed",
            Self::Database => "database",
            Self::NotFound => "not_found",
            Self::Serialization => "serialization",
            Self::Config => "config",
            Self::InvalidInput => "invalid_input",
            Self::Request => "request",
            Self::Internal => "internal",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Machine-readable code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Upload(_) => ErrorKind::UploadFailed,
            Error::UploadValidation(_) => ErrorKind::UploadValidation,
            Error::InvalidDocumentPath(_) => ErrorKind::InvalidDocumentPath,
            Error::DocumentRequired(_) => ErrorKind::DocumentRequired,
            Error::Extraction(_) => ErrorKind::ExtractionFailed,
            Error::Database(_) => ErrorKind::Database,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Request(_) => ErrorKind::Request,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error aborts a save before the backend write.
    ///
    /// Extraction failures are advisory: the form stays usable manually.
    pub fn is_fatal_to_save(&self) -> bool {
        !matches!(self, Error::Extraction(_))
    }

    /// Short name of the step that failed, for blocking notifications.
    pub fn failed_step(&self) -> &'static str {
        match self {
            Error::Upload(_) | Error::UploadValidation(_) => "document upload failed",
            Error::InvalidDocumentPath(_) => "document path invalid",
            Error::DocumentRequired(_) => "document required",
            Error::Extraction(_) => "extraction failed, fill manually",
            Error::Database(_) => "saving record failed",
            _ => "operation failed",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_upload() {
        let err = Error::Upload("connection reset".to_string());
        assert_eq!(err.to_string(), "Document upload failed: connection reset");
    }

    #[test]
    fn test_error_display_upload_validation() {
        let err = Error::UploadValidation("http://cdn/x.pdf".to_string());
        assert_eq!(
            err.to_string(),
            "Document upload returned an unusable path: http://cdn/x.pdf"
        );
    }

    #[test]
    fn test_error_display_document_required() {
        let err = Error::DocumentRequired("events".to_string());
        assert_eq!(err.to_string(), "Document required: events");
    }

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(Error::Upload(String::new()).kind().as_str(), "upload_failed");
        assert_eq!(
            Error::UploadValidation(String::new()).kind().as_str(),
            "upload_validation"
        );
        assert_eq!(
            Error::InvalidDocumentPath(String::new()).kind().as_str(),
            "invalid_document_path"
        );
        assert_eq!(
            Error::DocumentRequired(String::new()).kind().as_str(),
            "document_required"
        );
        assert_eq!(
            Error::Extraction(String::new()).kind().as_str(),
            "extraction_failed"
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UploadValidation).unwrap();
        assert_eq!(json, "\"upload_validation\"");
    }

    #[test]
    fn test_extraction_is_not_fatal() {
        assert!(!Error::Extraction("timeout".into()).is_fatal_to_save());
        assert!(Error::Upload("timeout".into()).is_fatal_to_save());
        assert!(Error::DocumentRequired("x".into()).is_fatal_to_save());
    }

    #[test]
    fn test_failed_step_names() {
        assert_eq!(
            Error::Upload("x".into()).failed_step(),
            "document upload failed"
        );
        assert_eq!(
            Error::UploadValidation("x".into()).failed_step(),
            "document upload failed"
        );
        assert_eq!(
            Error::DocumentRequired("x".into()).failed_step(),
            "document required"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
