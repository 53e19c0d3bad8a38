//! Error types for Artifactor core

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur in Artifactor core
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A network failure that outlived its retry budget
    #[error("Transport error after {attempts} attempt(s) for {url}: {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Max retries exceeded for {url}: last response status {status} after {attempts} attempt(s)")]
    RetriesExhausted {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("HTTP {status} for {url}: {message}")]
    HttpStatus {
        status: u16,
        url: String,
        message: String,
    },

    #[error(
        "The following failures occurred while {direction} one or more artifacts {preposition} {artifact_uri}:{}",
        render_failures(.failures)
    )]
    AggregateTransferFailure {
        direction: &'static str,
        preposition: &'static str,
        artifact_uri: String,
        failures: BTreeMap<String, String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transfer task failed: {0}")]
    TaskFailed(String),
}

impl ArtifactError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ArtifactError::Transport { .. } | ArtifactError::RetriesExhausted { .. } => true,
            ArtifactError::Network(e) => e.is_connect() || e.is_timeout(),
            ArtifactError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn download_failures(
        artifact_uri: impl Into<String>,
        failures: BTreeMap<String, String>,
    ) -> Self {
        ArtifactError::AggregateTransferFailure {
            direction: "downloading",
            preposition: "from",
            artifact_uri: artifact_uri.into(),
            failures,
        }
    }

    pub(crate) fn upload_failures(
        artifact_uri: impl Into<String>,
        failures: BTreeMap<String, String>,
    ) -> Self {
        ArtifactError::AggregateTransferFailure {
            direction: "uploading",
            preposition: "to",
            artifact_uri: artifact_uri.into(),
            failures,
        }
    }

    /// Failed paths of an aggregate failure, empty for any other error
    pub fn failed_paths(&self) -> Vec<&str> {
        match self {
            ArtifactError::AggregateTransferFailure { failures, .. } => {
                failures.keys().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn render_failures(failures: &BTreeMap<String, String>) -> String {
    failures
        .iter()
        .map(|(path, error)| format!("\n##### File {} #####\n{}", path, error))
        .collect()
}

impl From<serde_json::Error> for ArtifactError {
    fn from(error: serde_json::Error) -> Self {
        ArtifactError::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for ArtifactError {
    fn from(error: url::ParseError) -> Self {
        ArtifactError::InvalidUrl(error.to_string())
    }
}

// Allow converting to String for CLI reporting
impl From<ArtifactError> for String {
    fn from(error: ArtifactError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_failure_lists_every_path() {
        let mut failures = BTreeMap::new();
        failures.insert("a.txt".to_string(), "boom".to_string());
        failures.insert("sub/b.txt".to_string(), "HTTP 500".to_string());

        let error = ArtifactError::download_failures("http://host/artifacts", failures);
        let message = error.to_string();

        assert!(message.contains("from http://host/artifacts"));
        assert!(message.contains("##### File a.txt #####\nboom"));
        assert!(message.contains("##### File sub/b.txt #####\nHTTP 500"));
        assert_eq!(error.failed_paths(), vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn test_retryable_classification() {
        let server_error = ArtifactError::HttpStatus {
            status: 503,
            url: "http://x".into(),
            message: String::new(),
        };
        assert!(server_error.is_retryable());
        assert!(!ArtifactError::InvalidArgument("bad".into()).is_retryable());
    }
}
