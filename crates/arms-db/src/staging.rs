//! Staging areas for freshly selected documents.
//!
//! A staged document is addressed as `/uploaded-document/{id}-{filename}`.
//! Nothing here deletes staged files: anything never promoted is abandoned
//! and left to whatever sweeps the staging directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use arms_core::defaults::STAGED_PREFIX;
use arms_core::{
    detect_content_type, sanitize_filename, temporary_key, DocumentRef, Error, Result, StagedFile,
    StagingStore,
};

/// Build a new staged path for a filename.
fn new_staged_name(filename: &str) -> String {
    format!("{}-{}", temporary_key(), sanitize_filename(filename))
}

/// Extract the staged file name from a staged path.
///
/// Rejects anything that is not exactly one segment under the staged prefix.
fn staged_name(staged_path: &str) -> Result<&str> {
    let name = staged_path.strip_prefix(STAGED_PREFIX).ok_or_else(|| {
        Error::InvalidDocumentPath(format!("'{}' is not a staged path", staged_path))
    })?;
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::InvalidDocumentPath(format!(
            "'{}' is not a staged path",
            staged_path
        )));
    }
    Ok(name)
}

/// Original filename of a staged name (the part after the id prefix).
fn original_filename(name: &str) -> &str {
    name.split_once('-').map(|(_, rest)| rest).unwrap_or(name)
}

/// Staging area on the local filesystem.
pub struct LocalStagingArea {
    root: PathBuf,
}

impl LocalStagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StagingStore for LocalStagingArea {
    async fn stage(&self, file: StagedFile) -> Result<DocumentRef> {
        fs::create_dir_all(&self.root).await?;
        let name = new_staged_name(&file.filename);
        let full_path = self.root.join(&name);
        fs::write(&full_path, &file.data).await?;

        let staged_path = format!("{}{}", STAGED_PREFIX, name);
        debug!(
            subsystem = "storage",
            op = "stage",
            document_path = %staged_path,
            size_bytes = file.size(),
            "Staged document"
        );
        Ok(DocumentRef::Staged(staged_path))
    }

    async fn read(&self, staged_path: &str) -> Result<StagedFile> {
        let name = staged_name(staged_path)?;
        let data = match fs::read(self.root.join(name)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "Staged document '{}' not found",
                    staged_path
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let filename = original_filename(name).to_string();
        let content_type = detect_content_type(&filename, &data, "application/octet-stream");
        Ok(StagedFile::new(filename, content_type, data))
    }
}

/// In-memory staging area for development and tests.
#[derive(Default, Clone)]
pub struct MemoryStagingArea {
    files: Arc<RwLock<HashMap<String, StagedFile>>>,
}

impl MemoryStagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged files held.
    pub fn len(&self) -> usize {
        self.files.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StagingStore for MemoryStagingArea {
    async fn stage(&self, file: StagedFile) -> Result<DocumentRef> {
        let staged_path = format!("{}{}", STAGED_PREFIX, new_staged_name(&file.filename));
        let mut files = self
            .files
            .write()
            .map_err(|_| Error::Internal("staging lock poisoned".to_string()))?;
        files.insert(staged_path.clone(), file);
        Ok(DocumentRef::Staged(staged_path))
    }

    async fn read(&self, staged_path: &str) -> Result<StagedFile> {
        staged_name(staged_path)?;
        let files = self
            .files
            .read()
            .map_err(|_| Error::Internal("staging lock poisoned".to_string()))?;
        files.get(staged_path).cloned().ok_or_else(|| {
            Error::NotFound(format!("Staged document '{}' not found", staged_path))
        })
    }
}
