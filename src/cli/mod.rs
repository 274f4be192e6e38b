//! CLI command definitions and handlers

mod aggregate;
mod drift;
mod sanity;
mod score;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Taskgauge - deterministic task-completion scoring
///
/// Scores engineering tasks declared against a source repository by
/// combining static-analysis signals, declared metadata, and test
/// evidence through a weighted, gated scoring model.
#[derive(Parser, Debug)]
#[command(name = "taskgauge")]
#[command(
    version,
    about = "Deterministic task-completion scoring from static signals, metadata, and test evidence",
    after_help = "\
Examples:
  taskgauge score .                          Score every declared task in the current repo
  taskgauge score . --format json            JSON output for scripting
  taskgauge aggregate repoA repoB -o index.yml   Aggregate with cross-repo dependencies
  taskgauge sanity .                         Run only the repo sanity gate
  taskgauge drift . --baseline hashes.json   Report artifact drift against a baseline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every task declared in a repository's project map
    Score {
        /// Path to the repository root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(long, short = 'f', default_value = "yaml", value_parser = ["yaml", "json"])]
        format: String,

        /// Exit with an error when the repo cannot be scored
        #[arg(long)]
        strict: bool,
    },

    /// Scan several repositories sequentially and persist the aggregated
    /// index with rolling progress history
    Aggregate {
        /// Repository roots, scanned in the given order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output index file
        #[arg(long, short = 'o', default_value = "repos_index.yml")]
        output: PathBuf,

        /// Rolling history length per repo
        #[arg(long, default_value_t = crate::aggregate::DEFAULT_HISTORY_LEN)]
        history_len: usize,

        /// Skip history accumulation, persist the bare index
        #[arg(long)]
        no_history: bool,

        /// Record the newest artifact modification time per repo
        #[arg(long)]
        timestamps: bool,
    },

    /// Run only the repo-wide sanity gate
    Sanity {
        /// Path to the repository root
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Report drift of declared implementation files against a baseline
    Drift {
        /// Path to the repository root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Prior hash map (JSON) to compare against
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Write the current hash map (JSON) to this file
        #[arg(long)]
        save_baseline: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Score {
            path,
            format,
            strict,
        } => score::run(&path, &format, strict),
        Commands::Aggregate {
            paths,
            output,
            history_len,
            no_history,
            timestamps,
        } => aggregate::run(&paths, &output, history_len, no_history, timestamps),
        Commands::Sanity { path } => sanity::run(&path),
        Commands::Drift {
            path,
            baseline,
            save_baseline,
        } => drift::run(&path, baseline.as_deref(), save_baseline.as_deref()),
    }
}
