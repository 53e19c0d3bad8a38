//! Depth-first enumeration of a remote artifact tree
//!
//! Uses an explicit work list instead of recursion, so tree depth never
//! grows the call stack. One listing call is made per directory visited.

use crate::engine::store::ArtifactStore;
use crate::error::ArtifactError;
use artifactor_types::FileInfo;
use std::collections::HashSet;
use tracing::debug;

enum Pending {
    Unlisted(String),
    Listed(String, Vec<FileInfo>),
    Leaf(FileInfo),
}

/// Lazy, finite, non-restartable sequence of the leaves below a directory.
///
/// Yields files, plus one directory marker (`is_dir == true`) for every
/// directory without children.
pub struct ArtifactWalker<'a, S: ArtifactStore + ?Sized> {
    store: &'a S,
    stack: Vec<Pending>,
    visited: HashSet<String>,
    list_calls: usize,
}

impl<'a, S: ArtifactStore + ?Sized> ArtifactWalker<'a, S> {
    /// Walk below `root`, listing it on the first call to [`next`](Self::next)
    pub fn new(store: &'a S, root: &str) -> Self {
        Self::start(store, Pending::Unlisted(root.to_string()), root)
    }

    /// Walk below `root` using a listing the caller already fetched
    pub fn with_listing(store: &'a S, root: &str, listing: Vec<FileInfo>) -> Self {
        Self::start(store, Pending::Listed(root.to_string(), listing), root)
    }

    fn start(store: &'a S, first: Pending, root: &str) -> Self {
        let mut visited = HashSet::new();
        visited.insert(normalize(root).to_string());
        Self {
            store,
            stack: vec![first],
            visited,
            list_calls: 0,
        }
    }

    /// Listing calls issued so far
    pub fn list_calls(&self) -> usize {
        self.list_calls
    }

    /// Next leaf, or `None` once the tree is exhausted or a listing failed
    pub async fn next(&mut self) -> Option<Result<FileInfo, ArtifactError>> {
        loop {
            let (dir, listing) = match self.stack.pop()? {
                Pending::Leaf(info) => return Some(Ok(info)),
                Pending::Listed(dir, listing) => (dir, listing),
                Pending::Unlisted(dir) => {
                    self.list_calls += 1;
                    match self.store.list(&dir).await {
                        Ok(listing) => (dir, listing),
                        Err(e) => {
                            self.stack.clear();
                            return Some(Err(e));
                        }
                    }
                }
            };

            let children: Vec<FileInfo> = listing
                .into_iter()
                .filter(|info| !is_self_reference(&dir, info))
                .collect();

            if children.is_empty() {
                debug!("Empty artifact directory: {:?}", dir);
                return Some(Ok(FileInfo::dir(dir)));
            }

            // Reversed so the first child is popped first
            for info in children.into_iter().rev() {
                if !info.is_dir {
                    self.stack.push(Pending::Leaf(info));
                } else if self.visited.insert(normalize(&info.path).to_string()) {
                    self.stack.push(Pending::Unlisted(info.path));
                }
            }
        }
    }

    /// Drain the walker, stopping at the first listing error
    pub async fn collect(mut self) -> Result<Vec<FileInfo>, ArtifactError> {
        let mut leaves = Vec::new();
        while let Some(leaf) = self.next().await {
            leaves.push(leaf?);
        }
        Ok(leaves)
    }
}

fn normalize(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Whether a listing of `queried` names `queried` itself
fn is_self_reference(queried: &str, info: &FileInfo) -> bool {
    let path = normalize(&info.path);
    path.is_empty() || path == "." || path == normalize(queried)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory tree: directory path -> listing
    struct TreeStore {
        tree: HashMap<String, Vec<FileInfo>>,
        calls: AtomicUsize,
    }

    impl TreeStore {
        fn new(entries: &[(&str, Vec<FileInfo>)]) -> Self {
            Self {
                tree: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArtifactStore for TreeStore {
        fn artifact_uri(&self) -> &str {
            "memory://tree"
        }

        async fn list(&self, path: &str) -> Result<Vec<FileInfo>, ArtifactError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == "broken" {
                return Err(ArtifactError::ResourceNotFound(path.to_string()));
            }
            Ok(self.tree.get(path).cloned().unwrap_or_default())
        }

        async fn upload_file(&self, _: &Path, _: Option<&str>) -> Result<(), ArtifactError> {
            Ok(())
        }

        async fn download_file(&self, _: &str, _: &Path) -> Result<(), ArtifactError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_walk_is_depth_first() {
        let store = TreeStore::new(&[
            (
                "",
                vec![
                    FileInfo::file("a.txt", Some(1)),
                    FileInfo::dir("sub"),
                    FileInfo::file("z.txt", Some(1)),
                ],
            ),
            (
                "sub",
                vec![FileInfo::file("sub/b.txt", Some(2)), FileInfo::dir("sub/empty")],
            ),
        ]);

        let leaves = ArtifactWalker::new(&store, "").collect().await.unwrap();
        let paths: Vec<_> = leaves.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["a.txt", "sub/b.txt", "sub/empty", "z.txt"]);
        assert!(leaves[2].is_dir);
        // root, sub, sub/empty
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_self_references_are_skipped() {
        let store = TreeStore::new(&[(
            "dir",
            vec![
                FileInfo::dir("dir"),
                FileInfo::dir("dir/"),
                FileInfo::dir("."),
                FileInfo::file("dir/x.bin", None),
            ],
        )]);

        let listing = store.list("dir").await.unwrap();
        let mut walker = ArtifactWalker::with_listing(&store, "dir", listing);
        let mut leaves = Vec::new();
        while let Some(leaf) = walker.next().await {
            leaves.push(leaf.unwrap());
        }

        assert_eq!(leaves, vec![FileInfo::file("dir/x.bin", None)]);
        assert_eq!(walker.list_calls(), 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_directory_of_only_self_references_is_a_marker() {
        let store = TreeStore::new(&[("d", vec![FileInfo::dir("d"), FileInfo::dir(".")])]);

        let leaves = ArtifactWalker::new(&store, "d").collect().await.unwrap();
        assert_eq!(leaves, vec![FileInfo::dir("d")]);
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        // "a" lists "b" and "b" lists "a" again
        let store = TreeStore::new(&[
            ("a", vec![FileInfo::dir("b"), FileInfo::file("a/f", None)]),
            ("b", vec![FileInfo::dir("a"), FileInfo::file("b/g", None)]),
        ]);

        let leaves = ArtifactWalker::new(&store, "a").collect().await.unwrap();
        let paths: Vec<_> = leaves.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b/g", "a/f"]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listing_error_ends_walk() {
        let store = TreeStore::new(&[(
            "",
            vec![FileInfo::dir("broken"), FileInfo::file("after.txt", None)],
        )]);

        let mut walker = ArtifactWalker::new(&store, "");
        assert!(matches!(
            walker.next().await,
            Some(Err(ArtifactError::ResourceNotFound(_)))
        ));
        assert!(walker.next().await.is_none());
    }
}
