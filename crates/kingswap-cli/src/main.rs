//! KingSwap economics CLI
//!
//! Replays farm scenarios and evaluates emission and early-exit math.

use std::path::PathBuf;

use alloy_primitives::U256;
use clap::{Parser, Subcommand};
use kingswap_cli::{describe_presets, early_exit, parse_amount, MultiplierReport, Scenario};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kingswap")]
#[command(version)]
#[command(about = "KingSwap farm and term-vault accounting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and print the receipts as JSON
    Simulate {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Emission of a preset over a block range
    Multiplier {
        /// Preset name
        #[arg(short, long, default_value = "archbishop-v2")]
        preset: String,

        /// Schedule start block
        #[arg(long, default_value = "0")]
        start: u64,

        /// First block (inclusive)
        #[arg(long)]
        from: u64,

        /// Last block (exclusive)
        #[arg(long)]
        to: u64,
    },

    /// Early withdrawal from a fixed-term deposit
    EarlyExit {
        /// Amount owed at maturity
        #[arg(long, value_parser = parse_amount)]
        amount_due: U256,

        /// Early repayable share, out of 255
        #[arg(long)]
        repayable_share: u8,

        /// Early withdraw fee, out of 255
        #[arg(long, default_value = "0")]
        fee_share: u8,

        /// Time of the deposit or of the last withdrawal
        #[arg(long)]
        last: u64,

        /// Maturity time
        #[arg(long)]
        maturity: u64,

        /// Withdrawal time
        #[arg(long)]
        now: u64,
    },

    /// List the farm presets
    Presets {
        /// Start block used for the listed ranges
        #[arg(long, default_value = "0")]
        start: u64,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate { scenario, compact } => {
            tracing::info!(path = %scenario.display(), "loading scenario");
            let report = Scenario::load(&scenario)?.run()?;
            print_json(&report, compact)?;
        }

        Commands::Multiplier { preset, start, from, to } => {
            let report = MultiplierReport::build(&preset, start, from, to)?;
            print_json(&report, false)?;
        }

        Commands::EarlyExit { amount_due, repayable_share, fee_share, last, maturity, now } => {
            let report = early_exit(amount_due, repayable_share, fee_share, last, maturity, now)?;
            print_json(&report, false)?;
        }

        Commands::Presets { start } => {
            print!("{}", describe_presets(start)?);
        }
    }

    Ok(())
}
