//! Error types for configuration and command-line handling.
//!
//! The buses themselves never fail; these cover the demo binary's inputs.

use thiserror::Error;

pub type SlotbusResult<T> = Result<T, SlotbusError>;

#[derive(Debug, Error)]
pub enum SlotbusError {
    #[error("Invalid value for {section}.{key}: '{value}' ({reason})")]
    InvalidConfigValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Configuration section '{0}' not found")]
    SectionNotFound(String),
}

impl SlotbusError {
    pub fn invalid_config_value(
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfigValue {
            section: section.into(),
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
