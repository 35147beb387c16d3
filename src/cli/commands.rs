//! CLI command implementations
//!
//! `init` prepares a data directory; `exec` opens the engine over it and runs
//! a statement script in a single session.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::json;

use crate::config::Config;
use crate::executor::Engine;
use crate::observability::{Event, Logger};
use crate::planner::Statement;
use crate::session::Session;
use crate::storage::Handler;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_script, write_response};

/// Marker file written by `init`
const INIT_MARKER: &str = ".relcore_init";

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Exec { config, script } => exec(&config, &script),
    }
}

/// Initialize a new data directory
///
/// Creates the data directory and the default database's directory, then
/// writes the init marker. Refuses a directory that is already initialized.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::already_initialized());
    }

    let db_dir = data_dir.join(&config.default_db);
    fs::create_dir_all(&db_dir).map_err(|e| {
        CliError::config_error(format!("Failed to create directory {:?}: {}", db_dir, e))
    })?;
    fs::write(data_dir.join(INIT_MARKER), b"")?;

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json!({ "initialized": true }))?;
    Ok(())
}

/// Run every statement of `script_path` and print each response
pub fn exec(config_path: &Path, script_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    if !is_initialized(config.data_path()) {
        return Err(CliError::not_initialized());
    }
    let statements = read_script(script_path)?;
    let mut stdout = io::stdout();
    run_script(&config, &statements, &mut stdout)
}

/// Opens the engine described by `config` and runs `statements` in one session
pub fn run_script(config: &Config, statements: &[Statement], out: &mut impl Write) -> CliResult<()> {
    let mut handler = Handler::open(config.data_path())?;
    handler.ensure_database(&config.default_db)?;
    let mut engine = Engine::new(handler).with_sync_on_commit(config.sync_on_commit);
    let mut session = Session::new(config.default_db.as_str());

    for statement in statements {
        let response = engine.execute(&mut session, statement);
        write_response(out, &response)?;
    }

    engine.handler_mut().sync()?;
    let metrics = engine.metrics().to_json();
    Logger::info(Event::ScriptComplete, &[("metrics", metrics.as_str())]);
    Ok(())
}

fn load_config(path: &Path) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::set_threshold(config.log_severity()?);
    Logger::info(
        Event::ConfigLoaded,
        &[
            ("data_dir", config.data_dir.as_str()),
            ("default_db", config.default_db.as_str()),
        ],
    );
    Ok(config)
}

fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(INIT_MARKER).exists()
}
