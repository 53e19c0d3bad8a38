//! Artifact repository - batch transfers between a store and local disk
//!
//! This is the top-level coordinator that:
//! - Decides file vs directory and enumerates remote trees
//! - Fans out one task per file (or per byte range) on the worker pool
//! - Joins every task and aggregates per-file failures

use crate::engine::chunk::{download_chunk, plan_chunks, presize_file, ByteRange};
use crate::engine::paths::{join_artifact_path, local_path_for, relative_artifact_path};
use crate::engine::pool::{default_max_workers, Batch, WorkerPool};
use crate::engine::store::{ArtifactStore, DirectDownload};
use crate::engine::walker::ArtifactWalker;
use crate::error::ArtifactError;
use crate::transport::{HttpTransport, TransportManager};
use artifactor_types::{FileInfo, TransferEvent, TransferSettings};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Batches of at least this many files log the progress-bar hint
const PROGRESS_HINT_THRESHOLD: usize = 10;

/// A file transfer decided before anything is scheduled
enum PlannedDownload {
    Whole {
        remote_path: String,
        local_path: PathBuf,
    },
    Chunked {
        remote_path: String,
        local_path: PathBuf,
        source: DirectDownload,
        ranges: Vec<ByteRange>,
    },
}

impl PlannedDownload {
    fn remote_path(&self) -> &str {
        match self {
            PlannedDownload::Whole { remote_path, .. }
            | PlannedDownload::Chunked { remote_path, .. } => remote_path,
        }
    }

    fn task_count(&self) -> usize {
        match self {
            PlannedDownload::Whole { .. } => 1,
            PlannedDownload::Chunked { ranges, .. } => ranges.len().max(1),
        }
    }
}

/// Transfers artifacts of one root between its store and the local filesystem
pub struct ArtifactRepository<S: ArtifactStore + ?Sized + 'static> {
    store: Arc<S>,
    settings: TransferSettings,
    pool: WorkerPool,
    /// Used for ranged downloads of large files
    transport: HttpTransport,
    event_tx: broadcast::Sender<TransferEvent>,
}

impl<S: ArtifactStore + ?Sized + 'static> ArtifactRepository<S> {
    /// Create a repository; the worker count is fixed from here on
    pub fn new(
        store: Arc<S>,
        settings: TransferSettings,
        transports: &TransportManager,
    ) -> Result<Self, ArtifactError> {
        let max_workers = match settings.max_workers_override {
            Some(n) if n > 0 => n,
            _ => default_max_workers(),
        };
        let transport = transports.transport(&settings.retry)?;
        let (event_tx, _) = broadcast::channel(1000);

        info!(
            "Opened artifact repository {} with {} workers",
            store.artifact_uri(),
            max_workers
        );

        Ok(Self {
            store,
            settings,
            pool: WorkerPool::new(max_workers),
            transport,
            event_tx,
        })
    }

    pub fn artifact_uri(&self) -> &str {
        self.store.artifact_uri()
    }

    pub fn max_workers(&self) -> usize {
        self.pool.size()
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Subscribe to transfer events
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: TransferEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Stop the worker pool. Later batches fail every task.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    // ========================================================================
    // Listing and deletion
    // ========================================================================

    /// Immediate children of `path` (the root when `None`)
    pub async fn list_artifacts(&self, path: Option<&str>) -> Result<Vec<FileInfo>, ArtifactError> {
        self.store.list(path.unwrap_or("")).await
    }

    /// Delete `artifact_path` recursively (the whole root when `None`)
    pub async fn delete_artifacts(&self, artifact_path: Option<&str>) -> Result<(), ArtifactError> {
        info!(
            "Deleting {:?} from {}",
            artifact_path.unwrap_or(""),
            self.artifact_uri()
        );
        self.store.delete_recursive(artifact_path).await
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Download a file or directory to `dst_path` (a fresh temporary
    /// directory when `None`) and return `<dst_path>/<artifact_path>`.
    pub async fn download_artifacts(
        &self,
        artifact_path: &str,
        dst_path: Option<&Path>,
    ) -> Result<PathBuf, ArtifactError> {
        let artifact_path = artifact_path.trim_end_matches('/');
        let dst = match dst_path {
            Some(path) => validate_destination(path).await?,
            None => create_temp_destination()?,
        };

        let listing = self.store.list(artifact_path).await?;
        let leaves = if listing.is_empty() {
            if artifact_path.is_empty() {
                // An empty root has nothing to fetch
                Vec::new()
            } else {
                vec![FileInfo::file(artifact_path, None)]
            }
        } else {
            ArtifactWalker::with_listing(&*self.store, artifact_path, listing)
                .collect()
                .await?
        };

        let plans = self.plan_downloads(&dst, leaves).await?;
        let batch_id = Uuid::new_v4();
        info!(
            "Downloading {} file(s) from {} to {} (batch {})",
            plans.len(),
            self.artifact_uri(),
            dst.display(),
            batch_id
        );

        let failures = self.run_downloads(batch_id, plans).await;
        if !failures.is_empty() {
            error!(
                "{} artifact download(s) from {} failed",
                failures.len(),
                self.artifact_uri()
            );
            return Err(ArtifactError::download_failures(
                self.artifact_uri(),
                failures,
            ));
        }

        local_path_for(&dst, artifact_path)
    }

    /// Resolve destinations, create directories and split large files.
    ///
    /// Runs to completion before any transfer starts, so its errors abort
    /// the whole batch.
    async fn plan_downloads(
        &self,
        dst: &Path,
        leaves: Vec<FileInfo>,
    ) -> Result<Vec<PlannedDownload>, ArtifactError> {
        let mut plans = Vec::with_capacity(leaves.len());

        for info in leaves {
            let local_path = local_path_for(dst, &info.path)?;
            if info.is_dir {
                fs::create_dir_all(&local_path).await?;
                continue;
            }
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            let size = info.file_size.unwrap_or(0);
            let chunkable = size > 0 && size >= self.settings.multipart_download_min_file_size;
            let source = if chunkable {
                self.store.direct_download(&info.path).await?
            } else {
                None
            };

            let plan = match source {
                Some(source) => {
                    presize_file(&local_path, size).await?;
                    let ranges = plan_chunks(size, self.settings.multipart_download_chunk_size);
                    debug!(
                        "Splitting {} ({} bytes) into {} ranges",
                        info.path,
                        size,
                        ranges.len()
                    );
                    PlannedDownload::Chunked {
                        remote_path: info.path,
                        local_path,
                        source,
                        ranges,
                    }
                }
                None => PlannedDownload::Whole {
                    remote_path: info.path,
                    local_path,
                },
            };
            plans.push(plan);
        }

        Ok(plans)
    }

    fn submit_download(&self, batch: &mut Batch<String>, plan: PlannedDownload) {
        match plan {
            PlannedDownload::Whole {
                remote_path,
                local_path,
            } => {
                let store = Arc::clone(&self.store);
                let key = remote_path.clone();
                batch.submit(key, async move {
                    store.download_file(&remote_path, &local_path).await
                });
            }
            PlannedDownload::Chunked {
                remote_path,
                local_path,
                source,
                ranges,
            } => {
                let source = Arc::new(source);
                let local_path = Arc::new(local_path);
                for range in ranges {
                    let transport = self.transport.clone();
                    let source = Arc::clone(&source);
                    let local_path = Arc::clone(&local_path);
                    batch.submit(remote_path.clone(), async move {
                        download_chunk(
                            &transport,
                            range.start,
                            range.end,
                            &source.headers,
                            &local_path,
                            &source.url,
                        )
                        .await
                    });
                }
            }
        }
    }

    /// Schedule every plan and wait for all of them; returns the failures
    async fn run_downloads(
        &self,
        batch_id: Uuid,
        plans: Vec<PlannedDownload>,
    ) -> BTreeMap<String, String> {
        let total = plans.len();
        let mut remaining: HashMap<String, usize> = HashMap::with_capacity(total);
        let mut batch = self.pool.batch::<String>();

        self.emit(TransferEvent::BatchStarted { batch_id, total });
        self.log_progress_hint(total);

        for plan in plans {
            remaining.insert(plan.remote_path().to_string(), plan.task_count());
            self.submit_download(&mut batch, plan);
        }

        self.join_batch(batch_id, total, &mut batch, remaining).await
    }

    /// Join a batch, counting a key as done when its last task finishes
    async fn join_batch(
        &self,
        batch_id: Uuid,
        total: usize,
        batch: &mut Batch<String>,
        mut remaining: HashMap<String, usize>,
    ) -> BTreeMap<String, String> {
        let mut failures: BTreeMap<String, String> = BTreeMap::new();
        let mut completed = 0usize;

        while let Some(outcome) = batch.next().await {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    // A task that never reported back; its key is unknown
                    error!("Lost a transfer task: {}", e);
                    failures.insert(format!("<task {}>", failures.len()), e.to_string());
                    continue;
                }
            };

            if let Err(e) = outcome.result {
                warn!("Transfer of {} failed: {}", outcome.key, e);
                failures
                    .entry(outcome.key.clone())
                    .and_modify(|message| {
                        message.push('\n');
                        message.push_str(&e.to_string());
                    })
                    .or_insert_with(|| e.to_string());
            }

            let left = remaining.get_mut(&outcome.key).map(|left| {
                *left = left.saturating_sub(1);
                *left
            });
            if left != Some(0) {
                continue;
            }

            if let Some(error) = failures.get(&outcome.key) {
                self.emit(TransferEvent::FileFailed {
                    batch_id,
                    path: outcome.key,
                    error: error.clone(),
                });
            } else {
                completed += 1;
                debug!("Transferred {} ({}/{})", outcome.key, completed, total);
                self.emit(TransferEvent::FileCompleted {
                    batch_id,
                    path: outcome.key,
                    completed,
                    total,
                });
            }
        }

        self.emit(TransferEvent::BatchFinished {
            batch_id,
            completed,
            failed: failures.len(),
        });
        failures
    }

    /// Logged once per batch, before any of its tasks are joined
    fn log_progress_hint(&self, total: usize) {
        if wants_progress_hint(total, self.settings.enable_progress) {
            info!(
                "Transferring {} files; set {}=false to disable the progress bar",
                total,
                crate::config::ENABLE_PROGRESS_BAR
            );
        }
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Upload one local file to `<artifact_path>/<file name>`
    pub async fn log_artifact(
        &self,
        local_file: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), ArtifactError> {
        let metadata = metadata_or_not_found(local_file).await?;
        if !metadata.is_file() {
            return Err(ArtifactError::InvalidArgument(format!(
                "Not a file: {}",
                local_file.display()
            )));
        }

        info!(
            "Uploading {} to {}",
            local_file.display(),
            self.artifact_uri()
        );
        self.store.upload_file(local_file, artifact_path).await
    }

    /// Upload every file below `local_dir`, keeping its layout under
    /// `artifact_path`. Failures are aggregated like downloads.
    pub async fn log_artifacts(
        &self,
        local_dir: &Path,
        artifact_path: Option<&str>,
    ) -> Result<(), ArtifactError> {
        let metadata = metadata_or_not_found(local_dir).await?;
        if !metadata.is_dir() {
            return Err(ArtifactError::InvalidArgument(format!(
                "Not a directory: {}",
                local_dir.display()
            )));
        }

        let files = list_local_files(local_dir).await?;
        let base = artifact_path.unwrap_or("").trim_matches('/').to_string();
        let batch_id = Uuid::new_v4();
        let total = files.len();
        info!(
            "Uploading {} file(s) from {} to {} (batch {})",
            total,
            local_dir.display(),
            self.artifact_uri(),
            batch_id
        );

        let mut batch = self.pool.batch::<String>();
        let mut remaining = HashMap::with_capacity(total);
        self.emit(TransferEvent::BatchStarted { batch_id, total });
        self.log_progress_hint(total);

        for (local_file, rel_path) in files {
            let parent = match rel_path.rsplit_once('/') {
                Some((dir, _)) => join_artifact_path(&base, dir),
                None => base.clone(),
            };
            remaining.insert(rel_path.clone(), 1);

            let store = Arc::clone(&self.store);
            batch.submit(rel_path, async move {
                let target = (!parent.is_empty()).then_some(parent.as_str());
                store.upload_file(&local_file, target).await
            });
        }

        let failures = self.join_batch(batch_id, total, &mut batch, remaining).await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ArtifactError::upload_failures(self.artifact_uri(), failures))
        }
    }
}

async fn metadata_or_not_found(path: &Path) -> Result<std::fs::Metadata, ArtifactError> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ArtifactError::ResourceNotFound(
            format!("{} does not exist", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn validate_destination(path: &Path) -> Result<PathBuf, ArtifactError> {
    let metadata = metadata_or_not_found(path).await?;
    if !metadata.is_dir() {
        return Err(ArtifactError::InvalidArgument(format!(
            "The destination path for downloaded artifacts must be a directory: {}",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn wants_progress_hint(total: usize, enable_progress: bool) -> bool {
    enable_progress && total >= PROGRESS_HINT_THRESHOLD
}

/// A private `artifactor-*` directory under the system temp dir, left on
/// disk for the caller
fn create_temp_destination() -> Result<PathBuf, ArtifactError> {
    let dir = tempfile::Builder::new().prefix("artifactor-").tempdir()?;
    Ok(dir.keep())
}

/// Every regular file below `root`, with its POSIX path relative to `root`
async fn list_local_files(root: &Path) -> Result<Vec<(PathBuf, String)>, ArtifactError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                match relative_artifact_path(root, &path) {
                    Some(rel) => files.push((path, rel)),
                    None => warn!("Skipping non UTF-8 path {}", path.display()),
                }
            }
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_hint_threshold() {
        assert!(wants_progress_hint(10, true));
        assert!(wants_progress_hint(250, true));
        assert!(!wants_progress_hint(9, true));
        assert!(!wants_progress_hint(0, true));
        assert!(!wants_progress_hint(10, false));
    }

    #[cfg(unix)]
    #[test]
    fn test_temp_destination_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_temp_destination().unwrap();
        let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(mode, 0o700);
        assert!(name.starts_with("artifactor-"), "{}", name);
    }

    #[test]
    fn test_temp_destinations_are_distinct() {
        let first = create_temp_destination().unwrap();
        let second = create_temp_destination().unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
        std::fs::remove_dir_all(first).unwrap();
        std::fs::remove_dir_all(second).unwrap();
    }
}
