//! Artifact store on the local filesystem

use crate::engine::{join_artifact_path, local_path_for, ArtifactStore};
use crate::error::ArtifactError;
use artifactor_types::FileInfo;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Artifacts kept in a directory on local disk
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    uri: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let uri = root.display().to_string();
        Self { root, uri }
    }

    /// From a `file://` URI or a plain path
    pub fn from_uri(uri: &str) -> Result<Self, ArtifactError> {
        if uri.starts_with("file:") {
            let parsed = url::Url::parse(uri)?;
            let root = parsed
                .to_file_path()
                .map_err(|_| ArtifactError::InvalidUrl(uri.to_string()))?;
            Ok(Self {
                root,
                uri: uri.to_string(),
            })
        } else {
            Ok(Self::new(uri))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn artifact_uri(&self) -> &str {
        &self.uri
    }

    async fn list(&self, path: &str) -> Result<Vec<FileInfo>, ArtifactError> {
        let dir = local_path_for(&self.root, path)?;
        match fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut infos = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let rel = join_artifact_path(path, &name);
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                infos.push(FileInfo::dir(rel));
            } else {
                infos.push(FileInfo::file(rel, Some(metadata.len())));
            }
        }

        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    async fn upload_file(
        &self,
        local_file: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), ArtifactError> {
        let dest_dir = local_path_for(&self.root, artifact_path.unwrap_or(""))?;
        let file_name = local_file.file_name().ok_or_else(|| {
            ArtifactError::InvalidArgument(format!("No file name in {}", local_file.display()))
        })?;

        fs::create_dir_all(&dest_dir).await?;
        let dest = dest_dir.join(file_name);
        fs::copy(local_file, &dest).await?;
        debug!("Copied {} to {}", local_file.display(), dest.display());
        Ok(())
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), ArtifactError> {
        let source = local_path_for(&self.root, remote_path)?;
        fs::copy(&source, local_path).await?;
        Ok(())
    }

    async fn delete_recursive(&self, path: Option<&str>) -> Result<(), ArtifactError> {
        let target = local_path_for(&self.root, path.unwrap_or(""))?;
        match fs::metadata(&target).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&target).await?,
            Ok(_) => fs::remove_file(&target).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_sorted_and_relative() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sub")).unwrap();
        std::fs::write(root.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(root.path().join("a.txt"), b"a").unwrap();
        std::fs::write(root.path().join("sub").join("c.txt"), b"ccc").unwrap();

        let store = LocalArtifactStore::new(root.path());

        let top = store.list("").await.unwrap();
        assert_eq!(
            top,
            vec![
                FileInfo::file("a.txt", Some(1)),
                FileInfo::file("b.txt", Some(2)),
                FileInfo::dir("sub"),
            ]
        );

        let sub = store.list("sub").await.unwrap();
        assert_eq!(sub, vec![FileInfo::file("sub/c.txt", Some(3))]);

        assert!(store.list("a.txt").await.unwrap().is_empty());
        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_and_delete() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let file = scratch.path().join("model.bin");
        std::fs::write(&file, b"weights").unwrap();

        let store = LocalArtifactStore::new(root.path());
        store.upload_file(&file, Some("models/v1")).await.unwrap();

        let stored = root.path().join("models").join("v1").join("model.bin");
        assert_eq!(std::fs::read(&stored).unwrap(), b"weights");

        store.delete_recursive(Some("models")).await.unwrap();
        assert!(!root.path().join("models").exists());
        store.delete_recursive(Some("models")).await.unwrap();
    }

    #[test]
    fn test_from_file_uri() {
        let store = LocalArtifactStore::from_uri("file:///tmp/artifacts").unwrap();
        assert_eq!(store.root(), Path::new("/tmp/artifacts"));
        assert_eq!(store.artifact_uri(), "file:///tmp/artifacts");
    }
}
