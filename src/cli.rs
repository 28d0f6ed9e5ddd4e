use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Summarize CSV and spreadsheet uploads and suggest charts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Produce the full analysis report (summary, charts, preview, profile) as JSON
    Analyze(AnalyzeArgs),
    /// Print the suggested chart specifications as JSON
    Charts(InputArgs),
    /// Print per-column statistics in a formatted table
    Stats(InputArgs),
    /// Preview the first few rows of a file in a formatted table
    Preview(PreviewArgs),
    /// Store a file in a content-addressed blob store and print its handle
    Ingest(IngestArgs),
    /// Manage analysis option files
    Config(ConfigArgs),
}

/// Shared input options for commands reading a single local file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (.csv, .xlsx, .xls, .xlsm, .xlsb or .ods)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML options file (see `config init`)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Number of leading values sampled per column for type inference
    #[arg(long = "sample-size")]
    pub sample_size: Option<usize>,
    /// Emit indented JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Input file to analyze
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "handle",
        conflicts_with = "handle"
    )]
    pub input: Option<PathBuf>,
    /// Blob store directory holding a previously ingested upload
    #[arg(long, requires = "handle")]
    pub store: Option<PathBuf>,
    /// Handle printed by `ingest`
    #[arg(long, requires_all = ["store", "filename"])]
    pub handle: Option<String>,
    /// Original filename of the stored upload; its extension selects the parser
    #[arg(long, requires = "handle")]
    pub filename: Option<String>,
    /// YAML options file (see `config init`)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Number of rows included in the report preview
    #[arg(long = "preview-rows")]
    pub preview_rows: Option<usize>,
    /// Number of leading values sampled per column for type inference
    #[arg(long = "sample-size")]
    pub sample_size: Option<usize>,
    /// Emit indented JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display (defaults to the configured preview or prompt sample size)
    #[arg(long)]
    pub rows: Option<usize>,
    /// Print comma-joined sample lines instead of a table
    #[arg(long = "sample-lines")]
    pub sample_lines: bool,
    /// YAML options file (see `config init`)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Blob store directory (created when missing)
    #[arg(long)]
    pub store: PathBuf,
    /// File to store
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML options file (see `config init`)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write the default analysis options as YAML
    Init {
        /// Destination YAML file
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
