use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identity of a selected file. Assigned once, never reused by a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidenceId(pub u64);

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A proof-of-payment file picked by the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub content_type: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_type: "image/jpeg".to_string(),
        }
    }
}

/// Token for a locally rendered preview of a [`LocalFile`].
///
/// Deliberately neither `Clone` nor `Copy`: releasing consumes it, so a handle
/// cannot be released twice.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PreviewHandle(u64);

impl PreviewHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceStatus {
    Queued,
    Uploading,
    Uploaded { url: String },
    Failed { error: String },
}

#[derive(Debug)]
pub struct EvidenceItem {
    pub id: EvidenceId,
    pub file: LocalFile,
    pub preview: Option<PreviewHandle>,
    pub status: EvidenceStatus,
}

impl EvidenceItem {
    pub fn remote_url(&self) -> Option<&str> {
        match &self.status {
            EvidenceStatus::Uploaded { url } => Some(url),
            _ => None,
        }
    }

    /// Whether the item still holds one of the coordinator's slots.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self.status, EvidenceStatus::Failed { .. })
    }
}
