//! rxncurate CLI
//!
//! - `reference build`: substance exports → registry-number reference table
//! - `enrich`: attach SMILES/SELFIES to one batch file
//! - `combine`: concatenate corpus files
//! - `dedup`: merge equivalent reactions and drop duplicate procedures
//! - `run`: the whole batch pipeline from a config file
//! - `encode`: SMILES → SELFIES for ad-hoc checks

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rxncurate_core::{
    corpus, enrich_batch, merge, pipeline, reference, MolfileCanonicalizer, PipelineConfig,
    ReferenceTable, SelfiesEncoder, StructureEncoder, StructureResolver,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rxncurate")]
#[command(author, version, about = "Reaction corpus enrichment and dedup")]
struct Cli {
    /// Log per-record drop decisions (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach SMILES/SELFIES to one batch; drop incomplete procedures.
    Enrich {
        /// Raw batch (JSON array of reaction records)
        input: PathBuf,
        /// Reference table (registry id → SMILES)
        #[arg(short, long)]
        reference: PathBuf,
        /// Enriched output
        #[arg(short, long)]
        out: PathBuf,
        /// Disable the rayon worker pool
        #[arg(long)]
        sequential: bool,
    },

    /// Concatenate corpus files in the order given.
    Combine {
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Merge equivalent reactions and remove duplicate procedures.
    Dedup {
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Run the batch pipeline described by a JSON config.
    Run {
        /// Pipeline config (missing fields take their defaults)
        config: PathBuf,
        /// Override the config's base directory
        #[arg(long)]
        base_dir: Option<PathBuf>,
        #[arg(long)]
        sequential: bool,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Reference table commands.
    Reference {
        #[command(subcommand)]
        command: ReferenceCommands,
    },

    /// Print the SELFIES encoding of each SMILES argument.
    Encode { smiles: Vec<String> },
}

#[derive(Subcommand)]
enum ReferenceCommands {
    /// Build a table from substance exports (registry id → molfile candidates).
    ///
    /// Directories are searched for `.json` files. Later inputs override
    /// earlier ones.
    Build {
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
        /// Start from an existing table instead of an empty one
        #[arg(long)]
        extend: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Enrich {
            input,
            reference,
            out,
            sequential,
        } => cmd_enrich(&input, &reference, &out, !sequential),
        Commands::Combine { inputs, out } => cmd_combine(&inputs, &out),
        Commands::Dedup { input, out } => cmd_dedup(&input, &out),
        Commands::Run {
            config,
            base_dir,
            sequential,
            report,
        } => cmd_run(&config, base_dir, sequential, report.as_deref()),
        Commands::Reference { command } => match command {
            ReferenceCommands::Build {
                inputs,
                out,
                extend,
            } => cmd_reference_build(&inputs, &out, extend.as_deref()),
        },
        Commands::Encode { smiles } => cmd_encode(&smiles),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_enrich(input: &Path, reference: &Path, out: &Path, parallel: bool) -> Result<()> {
    println!("{} {}", "Enriching".green().bold(), input.display());

    let table = ReferenceTable::load(reference)?;
    let records = corpus::load(input)?;
    let encoder = SelfiesEncoder;
    let resolver = StructureResolver::new(&table, &encoder);
    let (enriched, report) = enrich_batch(records, &resolver, parallel);
    corpus::save(&enriched, out)?;

    println!("  {} {}", "→".cyan(), out.display());
    println!(
        "  {} records kept, {} dropped; {} procedures kept, {} dropped",
        report.records_out,
        report.records_dropped(),
        report.procedures_out,
        report.procedures_dropped()
    );
    Ok(())
}

fn cmd_combine(inputs: &[PathBuf], out: &Path) -> Result<()> {
    if inputs.is_empty() {
        bail!("combine needs at least one input");
    }
    println!("{} {} files", "Combining".green().bold(), inputs.len());
    let combined = corpus::combine_files(inputs, out)?;
    println!("  {} {} ({} records)", "→".cyan(), out.display(), combined.len());
    Ok(())
}

fn cmd_dedup(input: &Path, out: &Path) -> Result<()> {
    println!("{} {}", "Merging".green().bold(), input.display());
    let records = corpus::load(input)?;
    let (merged, report) = merge(records);
    corpus::save(&merged, out)?;

    println!("  {} {}", "→".cyan(), out.display());
    println!(
        "  {} → {} records ({} identity, {} composition matches); {} duplicate procedures removed",
        report.records_in,
        report.records_out,
        report.identity_matches,
        report.composition_matches,
        report.duplicate_procedures
    );
    if report.multi_matched > 0 {
        println!(
            "  {} {} candidates matched more than one record",
            "note".yellow().bold(),
            report.multi_matched
        );
    }
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    base_dir: Option<PathBuf>,
    sequential: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut config = PipelineConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = base_dir {
        config.base_dir = dir;
    }
    if sequential {
        config.parallel = false;
    }

    println!(
        "{} {} batches from {}",
        "Running".green().bold(),
        config.batch_names().len(),
        config.base_dir.display()
    );
    let report = pipeline::run(&config, &SelfiesEncoder)?;

    for batch in &report.batches {
        println!(
            "  {} {}: {} / {} records kept",
            "ok".green().bold(),
            batch.name,
            batch.enrich.records_out,
            batch.enrich.records_in
        );
    }
    println!(
        "  {} {} ({} → {} records)",
        "→".cyan(),
        report.output.display(),
        report.combined_records,
        report.merge.records_out
    );

    if let Some(path) = report_path {
        write_report(&report, path)?;
        println!("  {} {}", "→".cyan(), path.display());
    }
    Ok(())
}

fn cmd_reference_build(inputs: &[PathBuf], out: &Path, extend: Option<&Path>) -> Result<()> {
    let files = collect_json_files(inputs)?;
    if files.is_empty() {
        bail!("no substance files found");
    }
    println!(
        "{} reference table from {} files",
        "Building".green().bold(),
        files.len()
    );

    let mut table = match extend {
        Some(path) => ReferenceTable::load(path)?,
        None => ReferenceTable::new(),
    };
    let report = reference::build_from_files(&mut table, &files, &MolfileCanonicalizer)?;
    table.save(out)?;

    println!("  {} {} ({} entries)", "→".cyan(), out.display(), table.len());
    println!(
        "  {} converted, {} skipped, {} replaced",
        report.converted, report.skipped, report.replaced
    );
    Ok(())
}

fn cmd_encode(smiles: &[String]) -> Result<()> {
    let encoder = SelfiesEncoder;
    let mut failed = 0;
    for input in smiles {
        match encoder.encode(input) {
            Ok(selfies) => println!("{selfies}"),
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {}", "error".red().bold(), input, err);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} structures could not be encoded", smiles.len());
    }
    Ok(())
}

/// Files are taken as given; directories contribute their `.json` files in
/// path order.
fn collect_json_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(input).follow_links(false) {
            let entry = entry.with_context(|| format!("walking {}", input.display()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().map_or(false, |ext| ext == "json") {
                found.push(path.to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn write_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    corpus::write_json(report, path).with_context(|| format!("writing {}", path.display()))
}
