//! Error types for the Quill core.
//!
//! Action failures are never fatal: the dispatcher renders a [`ScriptError`]
//! through its `Display` implementation and sends the text back to the sender.
//! Only [`PluginError`] (raised while bootstrapping plugins) may abort startup.

use thiserror::Error;

// =============================================================================
// Script Errors
// =============================================================================

/// Errors reported by a script action.
///
/// The display string is exactly what the sender receives as a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// An external command failed, timed out or could not be started.
    #[error("{0}")]
    Command(String),

    /// The message carried a rule name the action does not know.
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// The action panicked while handling the message.
    #[error("script '{script}' panicked: {reason}")]
    Panicked {
        /// Name of the script whose action panicked.
        script: String,
        /// Panic payload, when it was a string.
        reason: String,
    },

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl ScriptError {
    /// Creates a free-form script error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

// =============================================================================
// Plugin Errors
// =============================================================================

/// Errors raised while a plugin bootstraps.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The plugin's configuration section could not be used.
    #[error("invalid configuration for plugin '{plugin}': {reason}")]
    InvalidConfig {
        /// Plugin name.
        plugin: String,
        /// What was wrong.
        reason: String,
    },

    /// The plugin could not finish loading.
    #[error("plugin '{plugin}' failed to load: {reason}")]
    LoadFailed {
        /// Plugin name.
        plugin: String,
        /// Underlying failure.
        reason: String,
    },
}

impl PluginError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Creates a load failure error.
    pub fn load_failed(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for plugin bootstrap.
pub type PluginResult<T> = Result<T, PluginError>;
