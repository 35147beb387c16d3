//! CLI argument definitions using clap
//!
//! Commands:
//! - relcore init --config <path>
//! - relcore exec --config <path> --script <file.json>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relcore - a small relational engine
#[derive(Parser, Debug)]
#[command(name = "relcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./relcore.json")]
        config: PathBuf,
    },

    /// Run a JSON array of statements in one session
    Exec {
        /// Path to configuration file
        #[arg(long, default_value = "./relcore.json")]
        config: PathBuf,

        /// JSON file holding the statements
        #[arg(long)]
        script: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
