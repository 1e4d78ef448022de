//! Centralized default constants for ARMS.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers and strings.

// =============================================================================
// DOCUMENT PATHS
// =============================================================================

/// Prefix every durable object-store path begins with.
pub const DURABLE_PREFIX: &str = "upload/";

/// Prefix every locally staged document reference begins with.
pub const STAGED_PREFIX: &str = "/uploaded-document/";

/// Substrings that mark a durable path as a placeholder echoed back by a
/// misbehaving store adapter.
pub const SENTINEL_MARKERS: &[&str] = &["dummy", "placeholder", "/demo/", "demo_", "sample_"];

/// Record payload field that carries the document path.
pub const DOCUMENT_FIELD: &str = "Image";

/// Prefix for record keys used before the record has an id.
pub const TEMP_RECORD_PREFIX: &str = "tmp";

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum accepted size of a staged document (bytes).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Extension used for durable objects when the staged filename has none.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Default staging directory for locally staged documents.
pub const STAGING_ROOT: &str = "./data/staging";

/// Default root directory for the filesystem durable store.
pub const STORAGE_ROOT: &str = "./data/objects";

// =============================================================================
// EXTRACTION
// =============================================================================

/// Minimum extraction confidence accepted for reconciliation.
///
/// Zero accepts every result; raise it to reject low-confidence passes.
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Default OpenAI-compatible endpoint for the extraction service.
pub const EXTRACTION_URL: &str = "http://localhost:11434/v1";

/// Default extraction model.
pub const EXTRACTION_MODEL: &str = "gpt-4o-mini";

/// Extraction request timeout in seconds.
pub const EXTRACTION_TIMEOUT_SECS: u64 = 120;

/// Largest document forwarded to the extraction service (bytes).
pub const EXTRACTION_MAX_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;

/// Characters of a text document included in the extraction prompt.
pub const EXTRACTION_TEXT_CHARS: usize = 24_000;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Idle form sessions are purged after this many seconds.
pub const SESSION_IDLE_SECS: u64 = 3600;

/// Interval between idle-session sweeps.
pub const SESSION_SWEEP_SECS: u64 = 300;
