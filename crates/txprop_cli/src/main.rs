//! txprop CLI
//!
//! Runs the transaction propagation scenarios and reports what each one
//! persisted.
//!
//! # Commands
//!
//! - `list` - List the available scenarios
//! - `run` - Run scenarios and report records, errors and physical counts

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Transaction propagation scenario runner.
#[derive(Parser)]
#[command(name = "txprop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available scenarios
    List,

    /// Run scenarios
    Run {
        /// Names of the scenarios to run
        names: Vec<String>,

        /// Run every scenario
        #[arg(short, long, conflicts_with = "names")]
        all: bool,
    },

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
        Commands::List => commands::list::run(cli.format)?,
        Commands::Run { names, all } => {
            if !all && names.is_empty() {
                return Err("Give scenario names or --all".into());
            }
            commands::run::run(&names, all, cli.format)?;
        }
        Commands::Version => {
            println!("txprop CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("txprop Core v{}", txprop_core::VERSION);
        }
    }

    Ok(())
}
