//! Configuration for the command plugin.
//!
//! Read from the `plugins.command` section of `quill.toml`:
//!
//! ```toml
//! [plugins.command]
//! dir = "./command"
//! timeout_secs = 30
//! ```
//!
//! Every field is optional. Environment overrides follow the runtime's
//! mapping, e.g. `QUILL_PLUGINS__COMMAND__DIR=/etc/quill/command`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directory searched for definitions when none is configured.
pub const DEFAULT_COMMAND_DIR: &str = "command";

/// Settings for [`CommandPlugin`](crate::CommandPlugin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Directory holding one YAML file per command definition.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Per-command time limit in seconds; `0` disables the limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shell used to run each command line (`<shell> -c <line>`).
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Registry name of the script serving the loaded definitions.
    #[serde(default = "default_script_name")]
    pub script_name: String,

    /// Registry name of the reload script.
    #[serde(default = "default_refresh_script")]
    pub refresh_script: String,

    /// Pattern that triggers a reload.
    #[serde(default = "default_refresh_trigger")]
    pub refresh_trigger: String,

    /// Abort startup when the initial load fails.
    #[serde(default)]
    pub required: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            timeout_secs: default_timeout_secs(),
            shell: default_shell(),
            script_name: default_script_name(),
            refresh_script: default_refresh_script(),
            refresh_trigger: default_refresh_trigger(),
            required: false,
        }
    }
}

impl CommandConfig {
    /// Creates the default configuration pointing at `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// The per-command time limit, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(DEFAULT_COMMAND_DIR)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_script_name() -> String {
    "cmd".to_string()
}

fn default_refresh_script() -> String {
    "refresh_cmd".to_string()
}

fn default_refresh_trigger() -> String {
    "^!refresh command".to_string()
}
