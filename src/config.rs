use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, Result};
use toml::Value;
use log::{debug, info};

use crate::error::SlotbusError;
use crate::logging::LogFormat;

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Settings for the session simulation run by the slotbus binary
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    /// Number of simulated host sessions
    pub sessions: usize,
    /// Notifications emitted by the producer thread
    pub emissions: usize,
    /// How long an emitter waits for a busy session before skipping it
    pub lock_timeout: Duration,
    /// How long a session thread keeps its own session locked per turn
    pub busy_time: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sessions: 4,
            emissions: 100,
            lock_timeout: Duration::from_millis(1),
            busy_time: Duration::from_millis(2),
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<(), SlotbusError> {
        if self.sessions == 0 {
            return Err(SlotbusError::invalid_config_value(
                "demo", "sessions", "0", "at least one session is required",
            ));
        }
        if self.emissions == 0 {
            return Err(SlotbusError::invalid_config_value(
                "demo", "emissions", "0", "at least one emission is required",
            ));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected.section -> section -> base
        if let Some(selected) = &self.selected_section {
            let overlay = format!("{}.{}", selected, section);
            if let Some(value) = self.config.get(&overlay).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select a named profile (`[<name>.<section>]` tables) for --config-name
    pub fn select_section(&mut self, name: String) -> Result<(), SlotbusError> {
        let prefix = format!("{}.", name);
        if !self.config.keys().any(|section| section.starts_with(&prefix)) {
            return Err(SlotbusError::SectionNotFound(name));
        }
        debug!("Selecting configuration profile: {}", name);
        self.selected_section = Some(name);
        Ok(())
    }

    /// Get numeric value with type conversion
    pub fn get_number<T: FromStr>(&self, section: &str, key: &str) -> Result<Option<T>> {
        match self.get_value(section, key) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| SlotbusError::invalid_config_value(section, key, value.as_str(), "expected a number").into()),
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get log format value with type conversion
    pub fn get_log_format(&self, section: &str, key: &str) -> Result<Option<LogFormat>> {
        match self.get_value(section, key) {
            Some(value) => value
                .parse::<LogFormat>()
                .map(Some)
                .map_err(|reason| SlotbusError::invalid_config_value(section, key, value.as_str(), reason).into()),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Get demo configuration from config file
    pub fn get_demo_config(&self) -> Result<DemoConfig> {
        let mut config = DemoConfig::default();

        if let Some(sessions) = self.get_number::<usize>("demo", "sessions")? {
            config.sessions = sessions;
        }
        if let Some(emissions) = self.get_number::<usize>("demo", "emissions")? {
            config.emissions = emissions;
        }
        if let Some(timeout_ms) = self.get_number::<u64>("demo", "lock-timeout-ms")? {
            config.lock_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(busy_ms) = self.get_number::<u64>("demo", "busy-ms")? {
            config.busy_time = Duration::from_millis(busy_ms);
        }

        config.validate()
            .context("Demo configuration validation failed")?;
        Ok(config)
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable $SLOTBUS_CONFIG
    if let Ok(env_path) = env::var("SLOTBUS_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("slotbus").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".slotbus.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.slotbus.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse()
        .context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(subtable) => {
                let section_name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml_table(subtable, section_name, config);
            }
            _ => {
                // Top-level scalars belong to [base]
                let section = if prefix.is_empty() { "base".to_string() } else { prefix.clone() };
                config
                    .entry(section)
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(dt) => dt.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}
