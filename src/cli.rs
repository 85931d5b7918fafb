use clap::Parser;
use std::path::PathBuf;

use crate::error::{SlotbusError, SlotbusResult};

/// Session-aware signal/slot bus simulator
#[derive(Parser, Debug)]
#[command(name = "slotbus")]
#[command(about = "Simulates host sessions receiving notifications through a session-aware signal bus")]
#[command(version)]
pub struct Args {
    /// Number of simulated sessions
    #[arg(short = 's', long, value_name = "COUNT")]
    pub sessions: Option<usize>,

    /// Number of notifications emitted by the producer
    #[arg(short = 'e', long, value_name = "COUNT")]
    pub emissions: Option<usize>,

    /// How long an emitter waits for a busy session (0 = do not wait)
    #[arg(long, value_name = "MS")]
    pub lock_timeout_ms: Option<u64>,

    /// How long each session keeps itself busy per turn
    #[arg(long, value_name = "MS")]
    pub busy_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration profile name
    #[arg(long, value_name = "NAME")]
    pub config_name: Option<String>,
}

pub fn parse_args() -> Args {
    Args::parse()
}

/// Reject argument combinations clap cannot express
pub fn validate_args(args: &Args) -> SlotbusResult<()> {
    let level_flags = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|flag| **flag)
        .count();
    if level_flags > 1 {
        return Err(SlotbusError::invalid_argument(
            "--verbose/--quiet/--debug",
            "only one of these may be given",
        ));
    }
    if args.sessions == Some(0) {
        return Err(SlotbusError::invalid_argument("--sessions", "must be at least 1"));
    }
    if args.emissions == Some(0) {
        return Err(SlotbusError::invalid_argument("--emissions", "must be at least 1"));
    }
    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(SlotbusError::invalid_argument(
            "--log-file-level",
            "requires --log-file",
        ));
    }
    Ok(())
}
