//! Directory-level views derived from the flat key namespace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file visible directly inside a virtual directory.
///
/// Derived transiently from a prefix listing; never persisted. The `key` is
/// the full canonical object key, `name` the leaf relative to the listed
/// directory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileEntry {
    /// Leaf name relative to the listed directory.
    pub name: String,

    /// Human-facing name recorded at ingest time, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Full canonical object key in the bucket.
    pub key: String,

    /// Size in bytes as reported by the store.
    pub size_bytes: i64,

    /// When the object was uploaded.
    pub uploaded_at: DateTime<Utc>,

    /// Store-assigned object id, required for version-safe deletion.
    pub file_id: String,
}

/// One-level view of a virtual directory: child folders and direct files.
///
/// Folders are sorted lexicographically ascending, files ascending by name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DirectoryListing {
    pub folders: Vec<String>,
    pub files: Vec<FileEntry>,
}

/// Result of ingesting a remote resource into the bucket.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IngestReceipt {
    /// Store-assigned object id.
    pub file_id: String,

    /// Canonical key the bytes were persisted under.
    pub key: String,

    /// Public download URL (`<base>/<bucket>/<key>`, percent-encoded).
    pub public_url: String,

    /// Size in bytes actually transferred.
    pub size_bytes: i64,

    /// Optional human-facing name carried alongside the canonical key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
