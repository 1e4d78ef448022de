//! Lifecycle configuration.

use arms_core::defaults;

/// Configuration for document lifecycle sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Largest file accepted on selection.
    pub max_upload_bytes: u64,
    /// Extraction results below this confidence are rejected.
    pub min_confidence: f64,
    /// Substrings that mark a store-returned path as a placeholder.
    pub sentinel_markers: Vec<String>,
    /// Probe `exists` before deleting a superseded document.
    pub check_exists_before_delete: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            min_confidence: defaults::MIN_CONFIDENCE,
            sentinel_markers: defaults::SENTINEL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            check_exists_before_delete: true,
        }
    }
}

impl LifecycleConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ARMS_MAX_UPLOAD_BYTES` | `10485760` | Upload size limit |
    /// | `ARMS_MIN_CONFIDENCE` | `0.0` | Extraction confidence gate (0..1) |
    /// | `ARMS_SENTINEL_MARKERS` | built-in list | Comma-separated placeholder markers |
    /// | `ARMS_CHECK_EXISTS_BEFORE_DELETE` | `true` | Probe before cleanup deletes |
    pub fn from_env() -> Self {
        let base = Self::default();

        let max_upload_bytes = std::env::var("ARMS_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(base.max_upload_bytes);

        let min_confidence = std::env::var("ARMS_MIN_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(base.min_confidence);

        let sentinel_markers = std::env::var("ARMS_SENTINEL_MARKERS")
            .ok()
            .map(|v| parse_markers(&v))
            .unwrap_or(base.sentinel_markers);

        let check_exists_before_delete = std::env::var("ARMS_CHECK_EXISTS_BEFORE_DELETE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(base.check_exists_before_delete);

        Self {
            max_upload_bytes,
            min_confidence,
            sentinel_markers,
            check_exists_before_delete,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_sentinel_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinel_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_check_exists_before_delete(mut self, check: bool) -> Self {
        self.check_exists_before_delete = check;
        self
    }
}

fn parse_markers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
