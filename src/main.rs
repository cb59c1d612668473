//! dllexports
//!
//! Lists the exported functions of one or more DLLs and saves them as a
//! table, CSV, XML or JSON.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};
use dllexports::batch::{self, ScanSummary};
use dllexports::config::DEFAULT_MAX_IMAGE_SIZE;
use dllexports::{Decoder, DecoderConfig, Format};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum OutputFormat {
    Table,
    Csv,
    Xml,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => Format::Table,
            OutputFormat::Csv => Format::Csv,
            OutputFormat::Xml => Format::Xml,
            OutputFormat::Json => Format::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "dllexports")]
#[command(about = "List the exported functions of Windows DLLs")]
#[command(version)]
struct Args {
    /// DLL files, or directories to search for *.dll
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output format (default: from --output extension, else table)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads for parallel scanning (default: one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Decode files one at a time on the main thread
    #[arg(long, conflicts_with = "jobs")]
    sequential: bool,

    /// Largest SizeOfImage accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    max_image_size: u32,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn format(&self) -> Format {
        match (self.format, &self.output) {
            (Some(format), _) => format.into(),
            (None, Some(path)) => Format::from_extension(path).unwrap_or_default(),
            (None, None) => Format::Table,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut files = Vec::new();
    for path in &args.paths {
        let found = batch::collect_dlls(path)
            .with_context(|| format!("failed to list {}", path.display()))?;
        if found.is_empty() {
            info!(path = %path.display(), "no DLLs found");
        }
        files.extend(found);
    }
    if files.is_empty() {
        bail!("no DLL files to scan");
    }

    let decoder = Decoder::new(DecoderConfig {
        max_image_size: args.max_image_size,
    });

    let results = if args.sequential {
        batch::scan(&decoder, &files)
    } else if let Some(jobs) = args.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to start worker threads")?;
        pool.install(|| batch::scan_parallel(&decoder, &files))
    } else {
        batch::scan_parallel(&decoder, &files)
    };

    for result in &results {
        if let Some(err) = result.error() {
            eprintln!("{}: {}", result.path.display(), err);
        }
    }

    let format = args.format();
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            dllexports::format::render(format, &results, &mut out)?;
            out.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            dllexports::format::render(format, &results, &mut out)?;
            out.flush()?;
        }
    }

    let summary = ScanSummary::from_results(&results);
    info!(
        decoded = summary.decoded,
        no_exports = summary.no_exports,
        failed = summary.failed,
        "scan complete"
    );
    if summary.all_failed() {
        bail!("all {} files failed to decode", summary.failed);
    }

    Ok(())
}
