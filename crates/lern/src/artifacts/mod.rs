//! Evidence uploads: file-type detection, size limits, and blob storage.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::{ArtifactFileType, CompetencyId, UserId, MAX_ARTIFACT_SIZE};

impl ArtifactFileType {
    /// Accepted type for `file_name`, judged by extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let guessed = mime_guess::from_path(Path::new(file_name)).first()?;
        match guessed.essence_str() {
            essence if essence == mime::APPLICATION_PDF.essence_str() => Some(Self::Pdf),
            essence if essence == mime::IMAGE_JPEG.essence_str() => Some(Self::Jpg),
            essence if essence == mime::IMAGE_PNG.essence_str() => Some(Self::Png),
            "video/mp4" => Some(Self::Mp4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    #[error("file name must not be empty")]
    MissingFileName,
    #[error("'{0}' is not a supported file type (pdf, jpg, jpeg, png, mp4)")]
    UnsupportedType(String),
    #[error("file is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("file is empty")]
    Empty,
    #[error("an artifact must evidence at least one competency")]
    NoCompetencies,
}

/// A raw upload before it is stored.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub learner_id: UserId,
    pub uploaded_by: UserId,
    pub file_name: String,
    pub competency_ids: Vec<CompetencyId>,
    pub bytes: Vec<u8>,
}

impl ArtifactUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check name, type, size, and linked competencies; returns the detected type.
    pub fn validate(&self) -> Result<ArtifactFileType, ArtifactError> {
        let file_name = self.file_name.trim();
        if file_name.is_empty() {
            return Err(ArtifactError::MissingFileName);
        }

        let file_type = ArtifactFileType::from_file_name(file_name)
            .ok_or_else(|| ArtifactError::UnsupportedType(file_name.to_string()))?;

        if self.bytes.is_empty() {
            return Err(ArtifactError::Empty);
        }
        if self.size() > MAX_ARTIFACT_SIZE {
            return Err(ArtifactError::TooLarge {
                size: self.size(),
                limit: MAX_ARTIFACT_SIZE,
            });
        }
        if self.competency_ids.is_empty() {
            return Err(ArtifactError::NoCompetencies);
        }

        Ok(file_type)
    }
}

/// `artifacts/{learner}/{unix_millis}_{file_name}` with path separators stripped from the name.
pub fn storage_path(learner_id: &UserId, file_name: &str, now: DateTime<Utc>) -> String {
    let safe_name: String = file_name
        .trim()
        .chars()
        .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
        .collect();
    format!(
        "artifacts/{}/{}_{}",
        learner_id,
        now.timestamp_millis(),
        safe_name
    )
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob storage unavailable: {0}")]
    Unavailable(String),
}

/// Binary storage for uploaded files. Returns a URL the file can be read back from.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;
    /// Remove a stored file. Removing a missing path is not an error.
    fn delete(&self, path: &str) -> Result<(), BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.lock().ok()?.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("blob store lock poisoned".to_string()))?;
        blobs.insert(
            path.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(format!("memory://{path}"))
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("blob store lock poisoned".to_string()))?
            .remove(path);
        Ok(())
    }
}
