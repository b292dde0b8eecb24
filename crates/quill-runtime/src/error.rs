//! Runtime error types.

use quill_core::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A plugin failed to bootstrap.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Runtime already started")]
    AlreadyStarted,

    #[error("Runtime not started")]
    NotStarted,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
