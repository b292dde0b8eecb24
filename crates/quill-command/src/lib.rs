//! # Quill Command
//!
//! A plugin that turns a directory of YAML files into chat commands.
//!
//! Each file declares a name, a trigger pattern and a list of shell lines.
//! When a message matches, the lines run in order; every output is sent back
//! to the sender as it completes, and the first failure stops the sequence
//! with an error reply. Sending `!refresh command` reloads the directory
//! without a restart.
//!
//! ```rust,ignore
//! use quill_command::{CommandConfig, CommandPlugin};
//!
//! let plugin = CommandPlugin::new(CommandConfig::with_dir("./command"));
//! runtime.register_plugin(plugin);
//! ```

pub mod config;
pub mod definition;
pub mod error;
pub mod loader;
pub mod plugin;
pub mod runner;

pub use config::{CommandConfig, DEFAULT_COMMAND_DIR};
pub use definition::{CommandDefinition, CommandSet};
pub use error::{CommandError, DefinitionError, LoadError};
pub use loader::{definition_files, load_definition_file, load_definitions};
pub use plugin::{CommandPlugin, PLUGIN_NAME};
pub use runner::{CommandRunner, ShellRunner};
