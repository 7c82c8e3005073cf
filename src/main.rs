use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fixdict::{generate_file, merge_files, prune_file, Settings};

#[derive(Debug, Parser)]
#[command(name = "fixdict", version, about = "Generate, merge and strip FIX xml dictionaries")]
struct Args {
    /// Config file (defaults to fixdict.toml when present)
    #[arg(short, long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the custom dictionary from the csv table
    Generate {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge the custom dictionary into the official one
    Merge {
        #[arg(long)]
        official: Option<PathBuf>,
        #[arg(long)]
        custom: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Strip the merged dictionary down to the keep-list
    Prune {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        keep_list: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run generate, merge and prune with configured paths
    All,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref()).context("failed to load config")?;

    match args.command {
        Command::Generate { csv, output } => {
            settings.override_generate(csv, output);
            run_generate(&settings)
        }
        Command::Merge {
            official,
            custom,
            output,
        } => {
            settings.override_merge(official, custom, output);
            run_merge(&settings)
        }
        Command::Prune {
            input,
            keep_list,
            output,
        } => {
            settings.override_prune(input, keep_list, output);
            run_prune(&settings)
        }
        Command::All => {
            run_generate(&settings)?;
            run_merge(&settings)?;
            run_prune(&settings)
        }
    }
}

fn run_generate(settings: &Settings) -> Result<()> {
    let stage = settings.generate();
    let report = generate_file(stage.csv(), stage.output(), &stage.options())
        .with_context(|| format!("failed to generate from {}", stage.csv().display()))?;
    print!("{}", report);
    Ok(())
}

fn run_merge(settings: &Settings) -> Result<()> {
    let stage = settings.merge();
    let report = merge_files(stage.official(), stage.custom(), stage.output()).with_context(|| {
        format!(
            "failed to merge {} into {}",
            stage.custom().display(),
            stage.official().display()
        )
    })?;
    print!("{}", report);
    Ok(())
}

fn run_prune(settings: &Settings) -> Result<()> {
    let stage = settings.prune();
    let summary = prune_file(stage.input(), stage.keep_list(), stage.output())
        .with_context(|| format!("failed to strip {}", stage.input().display()))?;
    println!(
        "Messages kept: {}, Fields kept: {}, Components kept: {}",
        summary.messages_kept(),
        summary.fields_kept(),
        summary.components_kept()
    );
    Ok(())
}
