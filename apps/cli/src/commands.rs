//! CLI command implementations

use crate::output::{format_bytes, print_listing, print_summary};
use crate::progress::BatchProgress;
use crate::OutputFormat;
use anyhow::{anyhow, Result};
use artifactor_core::{config, credentials_from_env, Artifactor};
use artifactor_types::{TransferSettings, TransferSummary};
use chrono::Utc;
use console::style;
use std::path::{Path, PathBuf};
use tracing::debug;

fn load_settings(no_progress: bool, max_threads: Option<usize>) -> Result<TransferSettings> {
    let mut settings = config::settings_from_env()?;
    if no_progress {
        settings.enable_progress = false;
    }
    if let Some(threads) = max_threads {
        if threads == 0 {
            return Err(anyhow!("--max-threads must be at least 1"));
        }
        settings.max_workers_override = Some(threads);
    }
    Ok(settings)
}

fn artifactor(settings: TransferSettings) -> Artifactor {
    Artifactor::with_credentials(settings, credentials_from_env())
}

// ============================================================================
// Transfer Commands
// ============================================================================

pub async fn download(
    uri: &str,
    path: &str,
    dst: Option<PathBuf>,
    no_progress: bool,
    max_threads: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let settings = load_settings(no_progress, max_threads)?;
    let show_progress = settings.enable_progress && format == OutputFormat::Human;
    let repo = artifactor(settings).open(uri)?;
    debug!("Downloading {:?} from {} with {} workers", path, uri, repo.max_workers());

    let tracker = tokio::spawn(BatchProgress::new(show_progress, "Download").track(repo.subscribe()));
    let started_at = Utc::now();
    let result = repo.download_artifacts(path, dst.as_deref()).await;
    drop(repo);
    let files = tracker.await.unwrap_or_default();
    let local_path = result?;

    let summary = TransferSummary {
        local_path,
        files,
        started_at,
        finished_at: Utc::now(),
    };
    print_summary("Downloaded", &summary, format)
}

pub async fn upload(
    local: &Path,
    uri: &str,
    path: Option<&str>,
    no_progress: bool,
    format: OutputFormat,
) -> Result<()> {
    let settings = load_settings(no_progress, None)?;
    let show_progress = settings.enable_progress && format == OutputFormat::Human;
    let repo = artifactor(settings).open(uri)?;
    let started_at = Utc::now();

    let files = if local.is_dir() {
        let tracker =
            tokio::spawn(BatchProgress::new(show_progress, "Upload").track(repo.subscribe()));
        let result = repo.log_artifacts(local, path).await;
        drop(repo);
        let files = tracker.await.unwrap_or_default();
        result?;
        files
    } else {
        repo.log_artifact(local, path).await?;
        1
    };

    let summary = TransferSummary {
        local_path: local.to_path_buf(),
        files,
        started_at,
        finished_at: Utc::now(),
    };
    print_summary("Uploaded", &summary, format)
}

// ============================================================================
// Store Commands
// ============================================================================

pub async fn list(uri: &str, path: Option<&str>, format: OutputFormat) -> Result<()> {
    let repo = artifactor(load_settings(true, None)?).open(uri)?;
    let infos = repo.list_artifacts(path).await?;
    print_listing(&infos, format)
}

pub async fn delete(uri: &str, path: Option<&str>, format: OutputFormat) -> Result<()> {
    let repo = artifactor(load_settings(true, None)?).open(uri)?;
    repo.delete_artifacts(path).await?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "deleted": path.unwrap_or(""), "uri": uri })
            );
        }
        OutputFormat::Human | OutputFormat::Table => {
            println!(
                "{} Deleted {}",
                style("✓").green().bold(),
                style(path.unwrap_or("all artifacts")).cyan()
            );
        }
    }
    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

pub fn show_config(format: OutputFormat) -> Result<()> {
    let settings = config::settings_from_env()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        _ => {
            let workers = settings
                .max_workers_override
                .unwrap_or_else(artifactor_core::default_max_workers);

            println!("Artifactor Configuration:");
            println!();
            println!("  Progress bar: {}", settings.enable_progress);
            println!("  Max workers: {}", workers);
            println!("  HTTP max retries: {}", settings.retry.max_retries);
            println!("  HTTP backoff factor: {}s", settings.retry.backoff_factor);
            println!(
                "  HTTP retried statuses: {:?}",
                settings.retry.retriable_status_codes
            );
            println!("  HTTP request timeout: {}s", settings.request_timeout_secs);
            println!(
                "  Multipart chunk size: {}",
                format_bytes(settings.multipart_download_chunk_size)
            );
            println!(
                "  Multipart minimum file size: {}",
                format_bytes(settings.multipart_download_min_file_size)
            );
        }
    }

    Ok(())
}
