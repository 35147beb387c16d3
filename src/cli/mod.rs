//! CLI module for relcore
//!
//! Provides command-line interface for:
//! - init: Create the data directory
//! - exec: Run a statement script in one session

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{exec, init, run, run_command, run_script};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_script, read_script, write_response};
