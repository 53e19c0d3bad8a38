//! Shared types for Artifactor
//!
//! This crate contains the value types shared between the transfer
//! engine and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Artifact Types
// ============================================================================

/// A single entry of a remote artifact listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInfo {
    /// Repository-relative, POSIX-style path
    pub path: String,
    pub is_dir: bool,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl FileInfo {
    pub fn file(path: impl Into<String>, file_size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            file_size,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            file_size: None,
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }
}

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP methods the transport is allowed to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parse a method name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status codes retried by default
pub const DEFAULT_RETRY_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Governs how transient HTTP failures are retried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Seconds; the n-th retry waits `backoff_factor * 2^(n-1)`
    pub backoff_factor: f64,
    pub retriable_status_codes: BTreeSet<u16>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
            retriable_status_codes: DEFAULT_RETRY_CODES.into_iter().collect(),
        }
    }

    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retriable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn is_retriable_status(&self, status: u16) -> bool {
        self.retriable_status_codes.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 2.0)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Knobs for multi-file transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Show a progress indicator during multi-file transfers
    pub enable_progress: bool,
    /// Replaces the CPU-derived worker count when set
    pub max_workers_override: Option<usize>,
    pub retry: RetryPolicy,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub multipart_download_chunk_size: u64,
    /// Files at least this large are fetched in parallel byte ranges
    pub multipart_download_min_file_size: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            enable_progress: true,
            max_workers_override: None,
            retry: RetryPolicy::default(),
            request_timeout_secs: 120,
            multipart_download_chunk_size: 100 * 1024 * 1024,
            multipart_download_min_file_size: 500 * 1024 * 1024,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Progress events emitted by the repository engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TransferEvent {
    BatchStarted {
        batch_id: Uuid,
        total: usize,
    },
    FileCompleted {
        batch_id: Uuid,
        path: String,
        completed: usize,
        total: usize,
    },
    FileFailed {
        batch_id: Uuid,
        path: String,
        error: String,
    },
    BatchFinished {
        batch_id: Uuid,
        completed: usize,
        failed: usize,
    },
}

impl TransferEvent {
    pub fn batch_id(&self) -> Uuid {
        match self {
            Self::BatchStarted { batch_id, .. }
            | Self::FileCompleted { batch_id, .. }
            | Self::FileFailed { batch_id, .. }
            | Self::BatchFinished { batch_id, .. } => *batch_id,
        }
    }
}

/// Outcome of a finished transfer, as reported to users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSummary {
    pub local_path: PathBuf,
    pub files: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferSummary {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("Patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("DELETE"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("POST"), None);
        assert_eq!(HttpMethod::parse(""), None);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        for code in DEFAULT_RETRY_CODES {
            assert!(policy.is_retriable_status(code));
        }
        assert!(!policy.is_retriable_status(404));
    }

    #[test]
    fn test_file_info_wire_format() {
        let info: FileInfo =
            serde_json::from_str(r#"{"path":"sub/b.txt","is_dir":false,"file_size":3}"#).unwrap();
        assert_eq!(info, FileInfo::file("sub/b.txt", Some(3)));
        assert_eq!(info.name(), "b.txt");

        let dir: FileInfo = serde_json::from_str(r#"{"path":"sub","is_dir":true}"#).unwrap();
        assert_eq!(dir, FileInfo::dir("sub"));
    }
}
