pub mod analysis;
pub mod charts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod frequency;
pub mod inference;
pub mod io_utils;
pub mod parser;
pub mod preview;
pub mod profile;
pub mod stats;
pub mod store;
pub mod table;

use std::{
    env,
    io::{self, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    analysis::Analysis,
    cli::{AnalyzeArgs, Cli, Commands, ConfigCommands, IngestArgs, InputArgs, PreviewArgs},
    config::AnalysisOptions,
    parser::Dataset,
    store::{BlobHandle, BlobStore, FsBlobStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("datrep", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Charts(args) => handle_charts(&args),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Config(args) => match args.command {
            ConfigCommands::Init { output, force } => handle_config_init(&output, force),
        },
    }
}

/// The JSON document printed by `analyze`.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub generated_at: String,
}

impl AnalysisReport {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

fn load_options(config: Option<&Path>) -> Result<AnalysisOptions> {
    match config {
        Some(path) => {
            AnalysisOptions::load(path).with_context(|| format!("Loading options from {path:?}"))
        }
        None => Ok(AnalysisOptions::default()),
    }
}

fn apply_sample_size(options: &mut AnalysisOptions, sample_size: Option<usize>) -> Result<()> {
    if let Some(size) = sample_size {
        options.inference.sample_size = size;
        options.validate()?;
    }
    Ok(())
}

fn load_dataset(path: &Path, options: &AnalysisOptions) -> Result<Dataset> {
    let bytes = io_utils::read_input(path, options.max_file_bytes)?;
    let filename = path.to_string_lossy();
    let dataset = parser::parse_bytes(&bytes, &filename)
        .with_context(|| format!("Parsing {path:?}"))?;
    debug!(
        "Parsed {} row(s) across {} column(s) from {path:?}",
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

fn write_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, value)?;
    } else {
        serde_json::to_writer(&mut handle, value)?;
    }
    writeln!(handle)?;
    Ok(())
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<()> {
    let mut options = load_options(args.config.as_deref())?;
    apply_sample_size(&mut options, args.sample_size)?;
    if let Some(rows) = args.preview_rows {
        options.preview_rows = rows;
    }

    let analysis = match (&args.input, &args.store, &args.handle, &args.filename) {
        (Some(input), _, _, _) => {
            info!("Analyzing '{}'", input.display());
            let dataset = load_dataset(input, &options)?;
            analysis::analyze_dataset(&dataset, &options)
        }
        (None, Some(root), Some(raw_handle), Some(filename)) => {
            info!("Analyzing stored upload {raw_handle} as '{filename}'");
            let store = FsBlobStore::open(root, options.max_file_bytes)
                .with_context(|| format!("Opening blob store {root:?}"))?;
            let handle = BlobHandle::parse(raw_handle)?;
            analysis::analyze_blob(&store, &handle, filename, &options)
                .with_context(|| format!("Analyzing stored upload {handle}"))?
        }
        _ => bail!("Provide --input or --store with --handle and --filename"),
    };

    info!(
        "Analysis covers {} row(s), {} column(s) and {} chart(s)",
        analysis.data_summary.rows,
        analysis.data_summary.columns,
        analysis.charts.len()
    );
    write_json(&AnalysisReport::new(analysis), args.pretty)
}

fn handle_charts(args: &InputArgs) -> Result<()> {
    let mut options = load_options(args.config.as_deref())?;
    apply_sample_size(&mut options, args.sample_size)?;
    let dataset = load_dataset(&args.input, &options)?;
    let types = inference::infer_types(&dataset, &options.inference);
    let charts = charts::derive_charts(&dataset, &types);
    info!(
        "Derived {} chart(s) for '{}'",
        charts.len(),
        args.input.display()
    );
    write_json(&charts, args.pretty)
}

fn handle_stats(args: &InputArgs) -> Result<()> {
    let mut options = load_options(args.config.as_deref())?;
    apply_sample_size(&mut options, args.sample_size)?;
    let dataset = load_dataset(&args.input, &options)?;
    let types = inference::infer_types(&dataset, &options.inference);
    let summary = analysis::summarize(&dataset, types);
    if args.pretty {
        return write_json(&summary, true);
    }
    let rows = stats::render_rows(
        &summary.statistics,
        &summary.data_types,
        &summary.missing_values,
    );
    table::print_table(&stats::render_headers(), &rows);
    info!(
        "Computed statistics for {} column(s) over {} row(s)",
        summary.columns, summary.rows
    );
    Ok(())
}

fn handle_preview(args: &PreviewArgs) -> Result<()> {
    let options = load_options(args.config.as_deref())?;
    let dataset = load_dataset(&args.input, &options)?;
    if args.sample_lines {
        let limit = args.rows.unwrap_or(options.prompt_sample_rows);
        println!("{}", preview::sample_lines(&dataset, limit));
        return Ok(());
    }
    let rows = preview::preview_table(&dataset, args.rows.unwrap_or(options.preview_rows));
    table::print_table(dataset.columns(), &rows);
    info!(
        "Displayed {} of {} row(s) from '{}'",
        rows.len(),
        dataset.row_count(),
        args.input.display()
    );
    Ok(())
}

fn handle_ingest(args: &IngestArgs) -> Result<()> {
    let options = load_options(args.config.as_deref())?;
    let bytes = io_utils::read_input(&args.input, options.max_file_bytes)?;
    io_utils::resolve_format(&args.input.to_string_lossy())?;
    let store = FsBlobStore::open(&args.store, options.max_file_bytes)
        .with_context(|| format!("Opening blob store {:?}", args.store))?;
    let handle = store.put(&bytes)?;
    info!(
        "Stored '{}' ({} byte(s)) in {:?}",
        args.input.display(),
        bytes.len(),
        args.store
    );
    println!("{handle}");
    Ok(())
}

fn handle_config_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{output:?} already exists; pass --force to overwrite");
    }
    AnalysisOptions::default()
        .save(output)
        .with_context(|| format!("Writing default options to {output:?}"))?;
    info!("Default options written to {output:?}");
    Ok(())
}
