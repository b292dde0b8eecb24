//! Configuration validation utilities.

use regex::Regex;

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, LogOutput, LoggingConfig, QuillConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &QuillConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_plugin_sections(config)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    for target in logging.filters.keys() {
        if target.trim().is_empty() || target.contains(['=', ',']) {
            return Err(ConfigError::validation(format!(
                "Invalid logging filter target: {target:?}"
            )));
        }
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::validation(
            "dispatch.queue_capacity must be greater than 0",
        ));
    }

    if dispatch.help
        && let Err(e) = Regex::new(&dispatch.help_trigger)
    {
        return Err(ConfigError::validation(format!(
            "dispatch.help_trigger is not a valid pattern: {e}"
        )));
    }

    Ok(())
}

fn validate_plugin_sections(config: &QuillConfig) -> ConfigResult<()> {
    for (name, section) in &config.plugins {
        if !(section.is_object() || section.is_null()) {
            return Err(ConfigError::validation(format!(
                "plugins.{name} must be a table"
            )));
        }
    }
    Ok(())
}
