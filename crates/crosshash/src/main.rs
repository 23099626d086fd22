//! Crosshash CLI - cross-modal hashing trainer and retrieval evaluator.
//!
//! Crosshash takes paired image/text feature files as input, trains a
//! hashing model with a similarity-preserving objective, and reports mean
//! Average Precision for all four retrieval directions.
//!
//! # Usage
//!
//! ```bash
//! # Train on a feature file
//! crosshash train features.json --output-dim 64
//!
//! # Re-score a saved evaluation artifact
//! crosshash eval --artifact result/pr_curve/64-ours-or5k-i2t.json
//!
//! # View configuration
//! crosshash config show
//! ```

use clap::{Parser, Subcommand};

mod baseline;
mod cli;
mod dataset;
mod logging;

/// Crosshash - cross-modal hashing trainer with Hamming-space retrieval evaluation.
#[derive(Parser, Debug)]
#[command(name = "crosshash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a hashing model on a paired feature file
    Train(cli::train::TrainArgs),

    /// Evaluate retrieval quality from a checkpoint or a saved artifact
    Eval(cli::eval::EvalArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    tracing::debug!("Crosshash v{}", crosshash_core::VERSION);

    match cli.command {
        Commands::Train(args) => cli::train::execute(args),
        Commands::Eval(args) => cli::eval::execute(args),
        Commands::Config(args) => cli::config::execute(args),
    }
}
