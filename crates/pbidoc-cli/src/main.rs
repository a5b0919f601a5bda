//! pbidoc CLI
//!
//! - `pbidoc document`: `.pbit` package → report model → narrative → versioned `.docx`
//! - `pbidoc extract`: `.pbit` package → report model JSON (no provider needed)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use pbidoc_cli::{pipeline, ConfigOverrides, PbidocConfig};
use pbidoc_narrative::providers::api_key_from_env;
use pbidoc_narrative::{create_generator, NarrativeError};

#[derive(Parser)]
#[command(name = "pbidoc")]
#[command(author, version, about = "Document Power BI reports from their .pbit templates")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Log filter (e.g. `debug`, `pbidoc_narrative=trace`); defaults to RUST_LOG or `info`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the report documentation from the template.
    Document {
        /// Also copy the raw layout and model documents here
        #[arg(long)]
        extract_dir: Option<PathBuf>,
    },

    /// Write the extracted report model as JSON.
    Extract {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also copy the raw layout and model documents here
        #[arg(long)]
        extract_dir: Option<PathBuf>,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = PbidocConfig::resolve(&cli.overrides)?;

    match cli.command {
        Commands::Document { extract_dir } => cmd_document(&config, extract_dir),
        Commands::Extract { out, extract_dir } => cmd_extract(&config, out, extract_dir),
    }
}

fn cmd_document(config: &PbidocConfig, extract_dir: Option<PathBuf>) -> Result<()> {
    let provider = config.provider_config();

    // A missing key ends the run before the package is touched.
    let api_key = match api_key_from_env(provider.provider) {
        Ok(key) => key,
        Err(NarrativeError::MissingCredential { provider, env }) => {
            eprintln!(
                "{} {provider} needs {} in the environment; no document was produced",
                "error:".red().bold(),
                env.bold()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let generator = create_generator(&provider, api_key)?;

    println!(
        "{} {} ({})",
        "Documenting".green().bold(),
        config.package_path().display(),
        generator.label()
    );

    let today = chrono::Local::now().date_naive();
    let run = pipeline::document(config, generator.as_ref(), today, extract_dir.as_deref())?;

    let model = &run.extraction.model;
    println!(
        "  {} {} pages, {} tables, {} relationships",
        "→".yellow(),
        model.pages.len(),
        model.tables.len(),
        model.relationships.len()
    );
    if !run.extraction.skipped_visuals.is_empty() {
        println!(
            "  {} {} visual(s) skipped",
            "→".yellow(),
            run.extraction.skipped_visuals.len()
        );
    }
    for title in &run.assembly.blocks_dropped {
        println!(
            "  {} template has no \"{}\" paragraph; section left out",
            "info:".yellow().bold(),
            title
        );
    }
    println!("{} {}", "wrote".green().bold(), run.output.display().to_string().bold());
    Ok(())
}

fn cmd_extract(config: &PbidocConfig, out: Option<PathBuf>, extract_dir: Option<PathBuf>) -> Result<()> {
    eprintln!("{} {}", "Extracting".green().bold(), config.package_path().display());
    let extraction = pipeline::extract(config, extract_dir.as_deref())?;
    let json = extraction
        .model
        .to_json_pretty()
        .context("failed to serialize report model")?;

    match &out {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{json}"),
    }
    eprintln!(
        "  {} {} visual(s) skipped, {} table(s) and {} relationship(s) excluded",
        "→".yellow(),
        extraction.skipped_visuals.len(),
        extraction.excluded_tables,
        extraction.excluded_relationships
    );
    Ok(())
}
