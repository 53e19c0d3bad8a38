//! Conversions between POSIX artifact paths and local filesystem paths

use crate::error::ArtifactError;
use std::path::{Component, Path, PathBuf};

/// Join two artifact paths with `/`, ignoring empty sides
pub fn join_artifact_path(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, rel),
    }
}

/// Local path of an artifact under `root`.
///
/// Rejects absolute paths and `..` segments so nothing lands outside `root`.
pub fn local_path_for(root: &Path, artifact_path: &str) -> Result<PathBuf, ArtifactError> {
    let mut path = root.to_path_buf();
    for segment in artifact_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(ArtifactError::InvalidArgument(format!(
                    "Artifact path escapes its root: {}",
                    artifact_path
                )))
            }
            _ => {}
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(segment),
            _ => {
                return Err(ArtifactError::InvalidArgument(format!(
                    "Invalid artifact path segment {:?} in {}",
                    segment, artifact_path
                )))
            }
        }
    }
    Ok(path)
}

/// POSIX path of `path` relative to `base`
pub fn relative_artifact_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let segments: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    Some(segments?.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_artifact_path() {
        assert_eq!(join_artifact_path("", "a.txt"), "a.txt");
        assert_eq!(join_artifact_path("dir/", "a.txt"), "dir/a.txt");
        assert_eq!(join_artifact_path("dir", ""), "dir");
        assert_eq!(join_artifact_path("", ""), "");
    }

    #[test]
    fn test_local_path_for() {
        let root = Path::new("/tmp/dst");
        assert_eq!(local_path_for(root, "").unwrap(), root);
        assert_eq!(
            local_path_for(root, "sub/b.txt").unwrap(),
            root.join("sub").join("b.txt")
        );
        assert_eq!(local_path_for(root, "./a//b/").unwrap(), root.join("a").join("b"));
    }

    #[test]
    fn test_local_path_for_rejects_escape() {
        let root = Path::new("/tmp/dst");
        assert!(matches!(
            local_path_for(root, "../etc/passwd"),
            Err(ArtifactError::InvalidArgument(_))
        ));
        assert!(local_path_for(root, "a/../../b").is_err());
    }

    #[test]
    fn test_relative_artifact_path() {
        let base = Path::new("/data/run");
        assert_eq!(
            relative_artifact_path(base, &base.join("sub").join("b.txt")).as_deref(),
            Some("sub/b.txt")
        );
        assert_eq!(relative_artifact_path(base, Path::new("/other")), None);
    }
}
