//! Artifactor Core - Artifact Transfer Engine
//!
//! This crate moves artifacts between artifact stores and the local
//! filesystem. It handles retrying HTTP, ranged downloads of large files,
//! bounded parallel batches and aggregated failure reports.

mod backends;
pub mod config;
mod engine;
mod error;
mod transport;

pub use backends::*;
pub use engine::*;
pub use error::*;
pub use transport::*;

use artifactor_types::TransferSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The main Artifactor instance
///
/// Owns the settings and the HTTP connection pools shared by every
/// repository it opens.
pub struct Artifactor {
    settings: TransferSettings,
    transports: Arc<TransportManager>,
    credentials: Arc<dyn CredentialProvider>,
}

impl Artifactor {
    /// Create an instance with explicit settings and anonymous access
    pub fn new(settings: TransferSettings) -> Self {
        Self::with_credentials(settings, Arc::new(NoCredentials))
    }

    pub fn with_credentials(
        settings: TransferSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let transports = Arc::new(TransportManager::from_settings(&settings));
        Self {
            settings,
            transports,
            credentials,
        }
    }

    /// Settings and credentials from `ARTIFACTOR_*` environment variables
    pub fn from_env() -> Result<Self, ArtifactError> {
        let settings = config::settings_from_env()?;
        Ok(Self::with_credentials(settings, credentials_from_env()))
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn transports(&self) -> &Arc<TransportManager> {
        &self.transports
    }

    /// Open the repository rooted at `artifact_uri`
    pub fn open(
        &self,
        artifact_uri: &str,
    ) -> Result<ArtifactRepository<dyn ArtifactStore>, ArtifactError> {
        let store = resolve_store(
            artifact_uri,
            &self.transports,
            &self.settings,
            Arc::clone(&self.credentials),
        )?;
        ArtifactRepository::new(store, self.settings.clone(), &self.transports)
    }

    /// Download `artifact_path` below `artifact_uri` in one call
    pub async fn download_artifacts(
        &self,
        artifact_uri: &str,
        artifact_path: &str,
        dst_path: Option<&Path>,
    ) -> Result<PathBuf, ArtifactError> {
        let repo = self.open(artifact_uri)?;
        repo.download_artifacts(artifact_path, dst_path).await
    }
}

impl Default for Artifactor {
    fn default() -> Self {
        Self::new(TransferSettings::default())
    }
}
