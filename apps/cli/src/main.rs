//! Artifactor CLI - Command-line artifact transfers
//!
//! Moves artifacts between local disk and artifact stores with parallel,
//! retrying transfers.

mod commands;
mod output;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Artifactor - Concurrent Artifact Transfers
#[derive(Parser)]
#[command(name = "artifactor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file or directory of artifacts
    Download {
        /// Artifact root URI (http(s)://, file:// or a local path)
        uri: String,

        /// Artifact path below the root
        #[arg(short, long, default_value = "")]
        path: String,

        /// Existing local directory to download into
        #[arg(short, long)]
        dst: Option<PathBuf>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Number of parallel transfers
        #[arg(long)]
        max_threads: Option<usize>,
    },

    /// Upload a local file or directory
    Upload {
        /// Local file or directory
        local: PathBuf,

        /// Artifact root URI
        uri: String,

        /// Artifact path below the root
        #[arg(short, long)]
        path: Option<String>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// List artifacts
    List {
        /// Artifact root URI
        uri: String,

        /// Directory below the root
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Delete artifacts recursively
    Delete {
        /// Artifact root URI
        uri: String,

        /// Artifact path below the root; the whole root when omitted
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Show the effective settings
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Download {
            uri,
            path,
            dst,
            no_progress,
            max_threads,
        } => {
            commands::download(&uri, &path, dst, no_progress, max_threads, cli.output).await?
        }

        Commands::Upload {
            local,
            uri,
            path,
            no_progress,
        } => commands::upload(&local, &uri, path.as_deref(), no_progress, cli.output).await?,

        Commands::List { uri, path } => commands::list(&uri, path.as_deref(), cli.output).await?,

        Commands::Delete { uri, path } => {
            commands::delete(&uri, path.as_deref(), cli.output).await?
        }

        Commands::Config => commands::show_config(cli.output)?,

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "artifactor",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
