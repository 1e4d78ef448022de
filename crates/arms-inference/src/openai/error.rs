//! Provider error classification.

use arms_core::Error;

/// Coarse error classes reported by OpenAI-compatible providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Document or prompt too large for the model context.
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl ProviderErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) | (413, _) if error_type.contains("context_length") || status == 413 => {
                Self::ContextLengthExceeded
            }
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if a later retry could succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Convert a provider error into the non-fatal extraction error.
pub fn to_extraction_error(code: ProviderErrorCode, message: &str) -> Error {
    let prefix = match code {
        ProviderErrorCode::AuthenticationError => "authentication failed",
        ProviderErrorCode::RateLimitExceeded => "rate limit exceeded",
        ProviderErrorCode::ModelNotFound => "model not found",
        ProviderErrorCode::ContextLengthExceeded => "document too large for model",
        ProviderErrorCode::ServerError => "server error",
        ProviderErrorCode::Unknown => "provider error",
    };
    Error::Extraction(format!("{}: {}", prefix, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_status() {
        assert_eq!(
            ProviderErrorCode::from_response(401, "invalid_api_key"),
            ProviderErrorCode::AuthenticationError
        );
        assert_eq!(
            ProviderErrorCode::from_response(429, ""),
            ProviderErrorCode::RateLimitExceeded
        );
        assert_eq!(
            ProviderErrorCode::from_response(400, "model_not_found"),
            ProviderErrorCode::ModelNotFound
        );
        assert_eq!(
            ProviderErrorCode::from_response(400, "context_length_exceeded"),
            ProviderErrorCode::ContextLengthExceeded
        );
        assert_eq!(
            ProviderErrorCode::from_response(413, ""),
            ProviderErrorCode::ContextLengthExceeded
        );
        assert_eq!(
            ProviderErrorCode::from_response(503, ""),
            ProviderErrorCode::ServerError
        );
        assert_eq!(
            ProviderErrorCode::from_response(400, "invalid_request"),
            ProviderErrorCode::Unknown
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationError.is_retryable());
    }

    #[test]
    fn test_errors_are_never_fatal_to_save() {
        let err = to_extraction_error(ProviderErrorCode::AuthenticationError, "bad key");
        assert!(!err.is_fatal_to_save());
        assert_eq!(err.to_string(), "Extraction failed: authentication failed: bad key");
    }
}
