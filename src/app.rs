//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, LevelFilter};
use std::time::Duration;

use crate::config::{ConfigManager, DemoConfig};
use crate::{cli, logging};

pub fn load_configuration(args: &cli::Args) -> Result<ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => ConfigManager::load_from_file(config_file.clone())?,
        None => ConfigManager::load()?,
    };

    if let Some(profile) = &args.config_name {
        manager.select_section(profile.clone())?;
    }

    Ok(manager)
}

/// Merge logging flags with the `[logging]` section; flags win
pub fn configure_logging(args: &cli::Args, config: &ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config.get_log_level("logging", "level")?.unwrap_or(LevelFilter::Info)
    };

    let format = match &args.log_format {
        Some(format) => format.parse::<logging::LogFormat>().map_err(anyhow::Error::msg)?,
        None => config
            .get_log_format("logging", "format")?
            .unwrap_or(logging::LogFormat::Text),
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("logging", "file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config.get_log_level("logging", "file-level")?,
    };

    let (destination, file_level) = match log_file {
        Some(path) => (
            logging::LogDestination::Both(path),
            Some(file_level.unwrap_or(console_level)),
        ),
        None => (logging::LogDestination::Console, None),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Demo settings from the config file with command-line overrides applied
pub fn resolve_demo_config(args: &cli::Args, config: &ConfigManager) -> Result<DemoConfig> {
    let mut demo = config.get_demo_config()?;

    if let Some(sessions) = args.sessions {
        demo.sessions = sessions;
    }
    if let Some(emissions) = args.emissions {
        demo.emissions = emissions;
    }
    if let Some(timeout_ms) = args.lock_timeout_ms {
        demo.lock_timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(busy_ms) = args.busy_ms {
        demo.busy_time = Duration::from_millis(busy_ms);
    }

    demo.validate().context("Invalid demo settings")?;
    debug!("Demo settings: {:?}", demo);
    Ok(demo)
}
