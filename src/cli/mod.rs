//! Command-line interface for shardrun
//!
//! Parses arguments with clap, installs logging and dispatches to the command
//! implementations in [`commands`].

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

pub mod commands;
mod output;

pub use output::Output;

/// shardrun - filter record sets in parallel under a shared worker quota
#[derive(Parser)]
#[command(
    name = "shardrun",
    version = env!("CARGO_PKG_VERSION"),
    about = "Quota-aware partitioned task runner for parallel record processing",
    propagate_version = true
)]
pub struct Cli {
    /// Use custom configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Filter the records of a CSV file in parallel
    Scan(commands::scan::ScanArgs),
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Show version information
    Version,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the merged configuration
    Show {
        /// Output format (json, toml)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Scan(args)) => {
                commands::scan::execute(args, self.config.as_deref(), &output).await
            }
            Some(Commands::Config(cmd)) => {
                commands::config::execute(cmd, self.config.as_deref(), &output).await
            }
            Some(Commands::Version) => commands::version::execute(&output).await,
            None => {
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
