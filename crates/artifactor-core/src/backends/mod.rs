//! Storage backends and URI-based store resolution

mod credentials;
mod http;
mod local;

pub use credentials::*;
pub use http::*;
pub use local::*;

use crate::engine::ArtifactStore;
use crate::error::ArtifactError;
use crate::transport::TransportManager;
use artifactor_types::TransferSettings;
use std::sync::Arc;

/// Pick a backend for `uri` by scheme; plain paths are local directories
pub fn resolve_store(
    uri: &str,
    transports: &TransportManager,
    settings: &TransferSettings,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<Arc<dyn ArtifactStore>, ArtifactError> {
    let scheme = uri.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        None | Some("file") => Ok(Arc::new(LocalArtifactStore::from_uri(uri)?)),
        Some("http") | Some("https") => {
            let transport = transports.transport(&settings.retry)?;
            Ok(Arc::new(HttpArtifactStore::new(uri, transport, credentials)?))
        }
        Some(other) => Err(ArtifactError::InvalidArgument(format!(
            "Unsupported artifact URI scheme '{}': {}",
            other, uri
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(uri: &str) -> Result<Arc<dyn ArtifactStore>, ArtifactError> {
        resolve_store(
            uri,
            &TransportManager::default(),
            &TransferSettings::default(),
            Arc::new(NoCredentials),
        )
    }

    #[test]
    fn test_resolve_by_scheme() {
        assert_eq!(resolve("/tmp/mlruns").unwrap().artifact_uri(), "/tmp/mlruns");
        assert_eq!(
            resolve("https://host/artifacts").unwrap().artifact_uri(),
            "https://host/artifacts"
        );
        assert!(matches!(
            resolve("s3://bucket/prefix"),
            Err(ArtifactError::InvalidArgument(_))
        ));
    }
}
