//! CLI entry point for the course statistics service.
//!
//! Provides subcommands for serving the query API, checking that the score
//! sheets load, and exporting the course table to CSV.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use course_stats::analyzers::table_rows;
use course_stats::output::write_table;
use course_stats::server;
use course_stats::store::{Assignment, SharedStore, SourcePaths, load_snapshot};
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "course_stats")]
#[command(about = "Merges homework score sheets and serves course statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// CSV with columns student_id, name, group, hw-01
    #[arg(long, default_value = "hw-01.csv")]
    hw01: PathBuf,

    /// CSV with columns student_id, name, group, hw-02
    #[arg(long, default_value = "hw-02.csv")]
    hw02: PathBuf,

    /// Optional CSV with columns student_id, exam
    #[arg(long)]
    exam: Option<PathBuf>,
}

impl From<SourceArgs> for SourcePaths {
    fn from(args: SourceArgs) -> Self {
        SourcePaths {
            hw01: args.hw01,
            hw02: args.hw02,
            exam: args.exam,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the query API over HTTP
    Serve {
        #[command(flatten)]
        sources: SourceArgs,

        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:1337")]
        bind: SocketAddr,
    },
    /// Load the sheets and print a summary of the merge
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Write the course table for one assignment to a CSV file
    Table {
        #[command(flatten)]
        sources: SourceArgs,

        /// Assignment to report (hw-01 or hw-02)
        #[arg(long)]
        hw: String,

        /// Only include this group
        #[arg(short, long)]
        group: Option<i64>,

        /// CSV file to write
        #[arg(short, long, default_value = "course_table.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/course_stats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("course_stats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { sources, bind } => {
            let store = Arc::new(SharedStore::open(sources.into())?);
            server::serve(store, bind).await?;
        }
        Commands::Check { sources } => {
            let sources: SourcePaths = sources.into();
            let snapshot = load_snapshot(&sources)?;
            info!(
                overlap_pct = snapshot.summary.overlap_pct(),
                loaded_at = %snapshot.loaded_at,
                "Sources loaded"
            );
            println!("{}", serde_json::to_string_pretty(&snapshot.summary)?);
        }
        Commands::Table {
            sources,
            hw,
            group,
            output,
        } => {
            let assignment: Assignment = hw.parse()?;
            let sources: SourcePaths = sources.into();
            let snapshot = load_snapshot(&sources)?;
            let rows = table_rows(&snapshot.store, assignment, group);
            write_table(&output, &rows)?;
        }
    }

    Ok(())
}
