//! Backend capability interface

use crate::error::ArtifactError;
use artifactor_types::FileInfo;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::path::Path;

/// A URL from which an artifact can be fetched with plain ranged GETs
#[derive(Debug, Clone)]
pub struct DirectDownload {
    pub url: String,
    pub headers: HeaderMap,
}

/// A storage backend holding one artifact root.
///
/// Listings must not include the queried path itself; the engine filters
/// `"."`, `""` and the queried path anyway.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Locator of the artifact root
    fn artifact_uri(&self) -> &str;

    /// Immediate children of `path`. Empty for files and missing paths.
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>, ArtifactError>;

    /// Store `local_file` as `<artifact_path>/<file name>`
    async fn upload_file(
        &self,
        local_file: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), ArtifactError>;

    /// Fetch one artifact into `local_path`, whose parent already exists
    async fn download_file(&self, remote_path: &str, local_path: &Path)
        -> Result<(), ArtifactError>;

    /// Remove `path` and everything below it
    async fn delete_recursive(&self, _path: Option<&str>) -> Result<(), ArtifactError> {
        Ok(())
    }

    /// Where `remote_path` can be fetched in byte ranges, if the backend allows it
    async fn direct_download(
        &self,
        _remote_path: &str,
    ) -> Result<Option<DirectDownload>, ArtifactError> {
        Ok(None)
    }
}
