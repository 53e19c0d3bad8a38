//! Output formatting utilities

use crate::OutputFormat;
use artifactor_types::{FileInfo, TransferSummary};
use console::style;
use tabled::{Table, Tabled};

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format a duration in seconds as human-readable
pub fn format_elapsed(seconds: f64) -> String {
    let whole = seconds as u64;
    let minutes = whole / 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, whole % 60)
    } else {
        format!("{:.1}s", seconds)
    }
}

pub fn print_summary(
    verb: &str,
    summary: &TransferSummary,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Human | OutputFormat::Table => {
            println!(
                "{} {} {} file(s) in {}",
                style("✓").green().bold(),
                verb,
                style(summary.files).bold(),
                format_elapsed(summary.elapsed_secs())
            );
            println!("  Path: {}", style(summary.local_path.display()).cyan());
        }
    }
    Ok(())
}

pub fn print_listing(infos: &[FileInfo], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(infos)?);
        }
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct ArtifactRow {
                path: String,
                kind: String,
                size: String,
            }

            let rows: Vec<ArtifactRow> = infos
                .iter()
                .map(|info| ArtifactRow {
                    path: info.path.clone(),
                    kind: if info.is_dir { "dir" } else { "file" }.to_string(),
                    size: info
                        .file_size
                        .map(format_bytes)
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            if infos.is_empty() {
                println!("{}", style("No artifacts found").dim());
                return Ok(());
            }

            for info in infos {
                if info.is_dir {
                    println!("{} {}/", style("▸").cyan(), style(&info.path).bold());
                } else {
                    let size = info.file_size.map(format_bytes).unwrap_or_default();
                    println!("{} {} {}", style("·").dim(), info.path, style(size).dim());
                }
            }
            println!();
            println!("{} artifact(s)", style(infos.len()).bold());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0.5), "0.5s");
        assert_eq!(format_elapsed(59.0), "59.0s");
        assert_eq!(format_elapsed(125.0), "2m 5s");
    }
}
