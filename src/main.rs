use anyhow::{Context, Result};
use log::{error, info};
use std::process;

use slotbus::{app, cli, demo, logging};

fn main() {
    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;
    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;
    if let Some(path) = config_manager.config_file_path() {
        info!("Using configuration file {}", path.display());
    }

    let demo_config = app::resolve_demo_config(&args, &config_manager)?;
    let report = demo::run_demo(&demo_config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize report")?;
        println!("{}", json);
        return Ok(());
    }

    println!(
        "Emissions: {} | Delivered: {} | Bypassed: {} | Skipped: {} | {} ms",
        report.stats.emissions,
        report.stats.delivered,
        report.stats.bypassed,
        report.stats.skipped,
        report.elapsed_ms
    );
    for session in &report.sessions {
        println!(
            "  {:<12} ticks: {:>6}  heartbeats: {:>6}",
            session.session, session.ticks, session.heartbeats
        );
    }
    info!(
        "Delivery ratio {:.1}%",
        report.stats.delivery_ratio() * 100.0
    );
    Ok(())
}
