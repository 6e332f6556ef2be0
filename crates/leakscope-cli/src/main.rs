//! CLI for leakscope — record crypto operations, read the side channels.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leakscope")]
#[command(about = "leakscope — record crypto operations, read the side channels")]
#[command(version = leakscope_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the operation kinds the recorder accepts
    Kinds,

    /// Record a simulated workload and print per-family metrics
    Measure {
        /// Operation kind wire name (e.g. RSA_DECRYPT); see `kinds`
        #[arg(long)]
        kind: String,

        /// Number of sessions to record
        #[arg(long, default_value = "32")]
        sessions: usize,

        /// Round marks per session
        #[arg(long, default_value = "10")]
        rounds: u64,

        /// Key size in bits stamped into each session's parameters
        #[arg(long, default_value = "2048")]
        key_size: u64,

        /// Seed for the simulated counter source (default: OS randomness)
        #[arg(long)]
        seed: Option<u64>,

        /// Write the full metrics bundle as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Record a simulated workload and build the leakage report
    Report {
        /// Operation kind wire name (e.g. RSA_DECRYPT); see `kinds`
        #[arg(long)]
        kind: String,

        /// Number of sessions to record
        #[arg(long, default_value = "32")]
        sessions: usize,

        /// Round marks per session
        #[arg(long, default_value = "10")]
        rounds: u64,

        /// Key size in bits stamped into each session's parameters
        #[arg(long, default_value = "2048")]
        key_size: u64,

        /// Seed for the simulated counter source (default: OS randomness)
        #[arg(long)]
        seed: Option<u64>,

        /// Write the report as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Kinds => commands::kinds::run(),
        Commands::Measure {
            kind,
            sessions,
            rounds,
            key_size,
            seed,
            output,
        } => commands::measure::run(commands::measure::MeasureCommandConfig {
            kind: &kind,
            sessions,
            rounds,
            key_size,
            seed,
            output_path: output.as_deref(),
        }),
        Commands::Report {
            kind,
            sessions,
            rounds,
            key_size,
            seed,
            output,
        } => commands::report::run(commands::report::ReportCommandConfig {
            kind: &kind,
            sessions,
            rounds,
            key_size,
            seed,
            output_path: output.as_deref(),
        }),
    }
}
