//! seglog CLI
//!
//! Command-line tools for seglog logs stored in a directory.
//!
//! # Commands
//!
//! - `inspect` - Display metadata and segment summaries
//! - `append` - Append payloads to the log
//! - `read` - Read records from an id onward
//! - `verify` - Load every segment and check it against the metadata

mod commands;

use clap::{Parser, Subcommand};
use commands::DurabilityArg;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// seglog command-line log tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Prefix of the log's files inside the directory
    #[arg(global = true, short, long, default_value = "")]
    base_path: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display metadata and segment summaries
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Append payloads, one record each
    Append {
        /// Payloads to append (UTF-8 text)
        #[arg(required = true)]
        payloads: Vec<String>,

        /// When append returns
        #[arg(short, long, value_enum, default_value_t = DurabilityArg::Immediate)]
        durability: DurabilityArg,
    },

    /// Read records from an id onward
    Read {
        /// Start from this id (default: the beginning)
        #[arg(long)]
        from: Option<i64>,

        /// Skip the record whose id equals --from
        #[arg(short, long)]
        exclusive: bool,

        /// Maximum number of records
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Load every segment and check it against the metadata
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &cli.base_path, &format)?;
        }
        Commands::Append {
            payloads,
            durability,
        } => {
            let path = cli.path.ok_or("Log path required for append")?;
            commands::append::run(&path, &cli.base_path, &payloads, durability.into())?;
        }
        Commands::Read {
            from,
            exclusive,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for read")?;
            commands::read::run(&path, &cli.base_path, from, !exclusive, limit, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path, &cli.base_path)?;
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog core v{}", seglog_core::VERSION);
        }
    }

    Ok(())
}
