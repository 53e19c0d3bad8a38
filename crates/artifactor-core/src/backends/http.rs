//! Artifact store behind an HTTP artifact service
//!
//! REST layout relative to the base URI:
//! - `GET    {base}?path=<dir>` lists a directory as `{"files": [...]}`
//! - `GET    {base}/<path>` downloads a file
//! - `PUT    {base}/<path>` uploads a file
//! - `DELETE {base}/<path>` deletes a file or directory

use crate::backends::credentials::CredentialProvider;
use crate::engine::{join_artifact_path, ArtifactStore, DirectDownload};
use crate::error::ArtifactError;
use crate::transport::{augmented_raise_for_status, HttpTransport, RequestOptions};
use artifactor_types::{FileInfo, HttpMethod};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    files: Vec<FileInfo>,
}

/// Artifacts served by a remote HTTP artifact service
#[derive(Debug, Clone)]
pub struct HttpArtifactStore {
    base: String,
    transport: HttpTransport,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpArtifactStore {
    pub fn new(
        base_uri: &str,
        transport: HttpTransport,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ArtifactError> {
        let parsed = url::Url::parse(base_uri)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ArtifactError::InvalidUrl(format!(
                "Expected an http(s) URI, got {}",
                base_uri
            )));
        }

        Ok(Self {
            base: base_uri.trim_end_matches('/').to_string(),
            transport,
            credentials,
        })
    }

    fn object_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        if encoded.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, encoded.join("/"))
        }
    }

    fn options(&self) -> Result<RequestOptions, ArtifactError> {
        Ok(RequestOptions::new().headers(&self.credentials.headers()?))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    fn artifact_uri(&self) -> &str {
        &self.base
    }

    async fn list(&self, path: &str) -> Result<Vec<FileInfo>, ArtifactError> {
        let path = path.trim_matches('/');
        let url = format!("{}?path={}", self.base, urlencoding::encode(path));
        let response = self.transport.send(HttpMethod::Get, &url, self.options()?).await?;
        let response = augmented_raise_for_status(response).await?;
        let body: ListResponse = response.json().await?;

        // The service answers with paths relative to the listed directory
        let mut infos: Vec<FileInfo> = body
            .files
            .into_iter()
            .map(|info| {
                let rel = info.path.trim_matches('/');
                let full = if rel.is_empty() || rel == "." {
                    path.to_string()
                } else {
                    join_artifact_path(path, rel)
                };
                FileInfo { path: full, ..info }
            })
            .collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    async fn upload_file(
        &self,
        local_file: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), ArtifactError> {
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ArtifactError::InvalidArgument(format!(
                    "No UTF-8 file name in {}",
                    local_file.display()
                ))
            })?;
        let target = join_artifact_path(artifact_path.unwrap_or(""), file_name);
        let body = tokio::fs::read(local_file).await?;
        let url = self.object_url(&target);

        debug!("Uploading {} ({} bytes) to {}", local_file.display(), body.len(), url);
        let response = self
            .transport
            .send(HttpMethod::Put, &url, self.options()?.body(body))
            .await?;
        augmented_raise_for_status(response).await?;
        Ok(())
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), ArtifactError> {
        let url = self.object_url(remote_path);
        let response = self.transport.send(HttpMethod::Get, &url, self.options()?).await?;
        let response = augmented_raise_for_status(response).await?;

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} ({} bytes)", remote_path, written);
        Ok(())
    }

    async fn delete_recursive(&self, path: Option<&str>) -> Result<(), ArtifactError> {
        let url = self.object_url(path.unwrap_or(""));
        let response = self
            .transport
            .send(HttpMethod::Delete, &url, self.options()?)
            .await?;
        augmented_raise_for_status(response).await?;
        Ok(())
    }

    async fn direct_download(
        &self,
        remote_path: &str,
    ) -> Result<Option<DirectDownload>, ArtifactError> {
        Ok(Some(DirectDownload {
            url: self.object_url(remote_path),
            headers: self.credentials.headers()?,
        }))
    }
}
