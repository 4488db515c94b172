// Command-line entry point for Provenance.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use provenance::application::{ProvenanceUsecase, Query};
use provenance::infrastructure::{ManifestRootLocator, ScanConfig, SynAnalyzer, DEFAULT_MANIFEST};
use provenance::ports::dot_exporter::DotExporter;
use provenance::ports::json_exporter::JsonExporter;
use provenance::ports::GraphExporter;
use provenance::ProvenanceError;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file containing the cursor
    file: PathBuf,

    /// Cursor line (1-based)
    line: u32,

    /// Cursor column (1-based)
    #[arg(default_value_t = 1)]
    column: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Dot)]
    format: Format,

    /// Write the graph here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Manifest file marking the project root
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    manifest: String,

    /// Extra directory names to skip while scanning (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Parser threads (default: half the cores)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Dot,
    Json,
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run(cli: &Cli) -> Result<()> {
    if cli.line == 0 || cli.column == 0 {
        anyhow::bail!("line and column are 1-based");
    }

    let locator = ManifestRootLocator::new(cli.manifest.clone());
    let analyzer = SynAnalyzer::new(ScanConfig {
        jobs: cli.jobs,
        manifest: locator.manifest().to_string(),
        ..ScanConfig::default().with_excludes(cli.exclude.iter().cloned())
    });
    let exporter: &dyn GraphExporter = match cli.format {
        Format::Dot => &DotExporter,
        Format::Json => &JsonExporter,
    };
    let usecase = ProvenanceUsecase {
        locator: &locator,
        analyzer: &analyzer,
        exporter,
    };
    let query = Query::new(&cli.file, cli.line, cli.column);

    // Build the graph before touching the output file.
    let graph = usecase.trace(&query)?;
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    exporter
        .export(&graph, &mut out)
        .context("Failed to write graph")?;
    out.flush().context("Failed to write graph")?;

    if let Some(path) = &cli.output {
        log::info!("graph written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<ProvenanceError>() {
                Some(ProvenanceError::NoTarget { .. }) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
