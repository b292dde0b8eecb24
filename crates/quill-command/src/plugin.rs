//! The command plugin.
//!
//! Serves the loaded [`CommandSet`] as one script. When a definition's rule
//! matches, its command lines run in order: each success is sent to the
//! sender right away, and the first failure ends the sequence and becomes the
//! failure reply. A second script reloads the definitions on demand.
//!
//! A load builds a new [`CommandSet`] and registers a new script that owns
//! it, so the rules and the definitions they name are always swapped
//! together. A failed load leaves the previous script in place.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use quill_core::{
    Action, ActionResult, Bot, ConfigurablePlugin, Message, Plugin, PluginError, PluginResult,
    Script, ScriptError, trigger_hint,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CommandConfig;
use crate::definition::CommandSet;
use crate::error::LoadError;
use crate::loader::load_definitions;
use crate::runner::{CommandRunner, ShellRunner};

/// Plugin name and configuration section key.
pub const PLUGIN_NAME: &str = "command";

const DESCRIPTION: &str = "Runs external commands";

/// Runs shell commands declared in YAML files.
///
/// Cloning shares the loaded state.
#[derive(Clone)]
pub struct CommandPlugin {
    inner: Arc<Inner>,
}

struct Inner {
    config: CommandConfig,
    runner: Arc<dyn CommandRunner>,
    commands: RwLock<Arc<CommandSet>>,
    reload: Mutex<()>,
}

impl CommandPlugin {
    /// Creates the plugin with a [`ShellRunner`] built from `config`.
    pub fn new(config: CommandConfig) -> Self {
        let runner = ShellRunner::from_config(&config);
        Self::with_runner(config, Arc::new(runner))
    }

    /// Creates the plugin with a custom runner.
    pub fn with_runner(config: CommandConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                runner,
                commands: RwLock::new(Arc::new(CommandSet::new())),
                reload: Mutex::new(()),
            }),
        }
    }

    /// Creates the plugin from its raw configuration section.
    pub fn from_value(value: &serde_json::Value) -> PluginResult<Self> {
        let config: CommandConfig = serde_json::from_value(value.clone())
            .map_err(|e| PluginError::invalid_config(PLUGIN_NAME, e.to_string()))?;
        <Self as ConfigurablePlugin>::from_config(config)
    }

    pub fn config(&self) -> &CommandConfig {
        &self.inner.config
    }

    pub fn dir(&self) -> &PathBuf {
        &self.inner.config.dir
    }

    /// The definitions currently being served.
    pub fn commands(&self) -> Arc<CommandSet> {
        Arc::clone(&*self.inner.commands.read())
    }

    /// Reloads definitions from disk and re-registers the command script.
    ///
    /// Concurrent calls run one at a time. On failure nothing changes.
    pub async fn load(&self, bot: &Bot) -> Result<usize, LoadError> {
        let _guard = self.inner.reload.lock().await;

        let dir = self.inner.config.dir.clone();
        let set = tokio::task::spawn_blocking(move || load_definitions(&dir))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?;

        let set = match set {
            Ok(set) => Arc::new(set),
            Err(e) => {
                warn!(dir = %self.inner.config.dir.display(), error = %e, "Command load failed, keeping previous definitions");
                return Err(e);
            }
        };

        let count = set.len();
        bot.registry()
            .register(&self.inner.config.script_name, self.command_script(Arc::clone(&set)));
        *self.inner.commands.write() = set;

        info!(script = %self.inner.config.script_name, count, "Command script registered");
        Ok(count)
    }

    fn command_script(&self, commands: Arc<CommandSet>) -> Script {
        let ruleset = commands.ruleset();
        let usage = commands.usage();
        Script::new(CommandAction {
            commands,
            runner: Arc::clone(&self.inner.runner),
        })
        .ruleset(ruleset)
        .usage(usage)
        .description(DESCRIPTION)
    }

    fn refresh_script(&self) -> Script {
        let plugin = self.clone();
        Script::new(move |bot: Bot, incoming: Message| {
            let plugin = plugin.clone();
            async move {
                match plugin.load(&bot).await {
                    Ok(count) => Ok(vec![incoming.reply(format!(
                        "command definitions reloaded ({count} commands)"
                    ))]),
                    Err(e) => Err(ScriptError::other(e.to_string())),
                }
            }
        })
        .rule("refresh", self.inner.config.refresh_trigger.clone())
        .usage(format!(
            "`{}`: reload command definitions",
            trigger_hint(&self.inner.config.refresh_trigger)
        ))
        .description("Reloads command definitions")
    }
}

impl std::fmt::Debug for CommandPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPlugin")
            .field("config", &self.inner.config)
            .field("commands", &self.inner.commands.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Plugin for CommandPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// Registers the refresh script, then performs the initial load.
    ///
    /// The refresh script goes first so a definition can never shadow it.
    async fn on_load(&self, bot: &Bot) -> PluginResult<()> {
        bot.registry()
            .register(&self.inner.config.refresh_script, self.refresh_script());

        match self.load(bot).await {
            Ok(_) => Ok(()),
            Err(e) if self.inner.config.required => {
                Err(PluginError::load_failed(PLUGIN_NAME, e.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Starting without commands; fix the definitions and refresh");
                Ok(())
            }
        }
    }
}

impl ConfigurablePlugin for CommandPlugin {
    type Config = CommandConfig;

    fn plugin_name() -> &'static str {
        PLUGIN_NAME
    }

    fn from_config(config: CommandConfig) -> PluginResult<Self> {
        if config.shell.trim().is_empty() {
            return Err(PluginError::invalid_config(PLUGIN_NAME, "shell must not be empty"));
        }
        Ok(Self::new(config))
    }
}

/// The action behind the command script.
struct CommandAction {
    commands: Arc<CommandSet>,
    runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl Action for CommandAction {
    async fn call(&self, bot: Bot, incoming: Message) -> ActionResult {
        let rule = incoming.rule().unwrap_or_default();
        let definition = self
            .commands
            .get(rule)
            .ok_or_else(|| ScriptError::UnknownRule(rule.to_string()))?;

        for (step, line) in definition.commands.iter().enumerate() {
            debug!(command = %definition.name, step, line = %line, "Running command");
            let output = self.runner.run(line).await?;
            bot.send(incoming.reply(output)).await;
        }

        Ok(Vec::new())
    }
}
