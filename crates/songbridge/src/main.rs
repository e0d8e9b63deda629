//! SongBridge launcher
//!
//! - `serve`: HTTP bridge the browser page posts selections to
//! - `list` / `plan`: inspect the catalog and key plans without touching the game
//! - `go`: navigate once from the command line

use clap::Parser;
use songbridge::cli::{self, Cli};
use songbridge_logging::{init_logging, LogConfig};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Flushes the file log when main returns
    let _log_guard = match init_logging(LogConfig {
        app_name: "songbridge",
        verbose: cli.verbose,
        quiet: cli.quiet,
    }) {
        Ok(guard) => {
            debug!("Logging to {}", guard.log_dir().display());
            Some(guard)
        }
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
