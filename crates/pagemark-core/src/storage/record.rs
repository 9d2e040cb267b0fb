//! The persisted annotation record.

use crate::annotations::PageNumber;
use crate::page::PageMap;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current record format version.
pub const RECORD_VERSION: u32 = 1;

/// Identifies a document across sessions by file name and byte size.
///
/// Two different files with the same name and size share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub file_name: String,
    pub file_size: u64,
}

impl DocumentFingerprint {
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
        }
    }

    /// Storage key.
    pub fn key(&self) -> String {
        format!("{}:{}", self.file_name, self.file_size)
    }
}

/// Every annotation of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    pub fingerprint: DocumentFingerprint,
    pub pages: PageMap,
    /// Base-scale page sizes known when the record was written.
    #[serde(default)]
    pub page_sizes: BTreeMap<PageNumber, Size>,
    /// Store revision the record was taken at.
    #[serde(default)]
    pub revision: u64,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

impl AnnotationRecord {
    pub fn new(fingerprint: DocumentFingerprint, pages: PageMap, revision: u64) -> Self {
        Self {
            version: RECORD_VERSION,
            fingerprint,
            pages,
            page_sizes: BTreeMap::new(),
            revision,
        }
    }

    pub fn key(&self) -> String {
        self.fingerprint.key()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Total annotations across all pages.
    pub fn annotation_count(&self) -> usize {
        self.pages.values().map(|p| p.len()).sum()
    }
}
