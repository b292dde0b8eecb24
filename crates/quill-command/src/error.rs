//! Error types for command definitions and command execution.

use std::path::PathBuf;
use std::time::Duration;

use quill_core::ScriptError;
use thiserror::Error;

/// A single definition file that could not be used.
///
/// Never fatal for a load: the file is skipped with a warning.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file is missing or unreadable.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for a definition.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file parsed but is not a usable definition.
    #[error("invalid definition in '{path}': {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Errors that fail a whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The directory path could not be turned into a file pattern.
    #[error("invalid definition pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The directory held no usable definitions.
    #[error("no commands found in '{}'", dir.display())]
    NoCommands { dir: PathBuf },

    /// The blocking load task did not complete.
    #[error("definition load task failed: {0}")]
    Task(String),
}

/// Errors from running one command line.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The shell could not be started or its output collected.
    #[error("failed to start command '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// The command ran and exited unsuccessfully.
    #[error("error running command: {status}: {output:?}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },

    /// The command exceeded its time limit and was killed.
    #[error("command timed out after {}s: {command}", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

impl From<CommandError> for ScriptError {
    fn from(err: CommandError) -> Self {
        ScriptError::Command(err.to_string())
    }
}
