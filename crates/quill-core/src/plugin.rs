//! Plugin trait.
//!
//! A plugin is anything that contributes scripts to the registry at startup.
//! The runtime calls [`Plugin::on_load`] once per plugin, in registration
//! order, with a [`Bot`] bound to the shared registry. Plugins that need to
//! refresh their scripts later (like the command plugin) keep whatever state
//! they need and re-register through the bot they are handed in actions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::bot::Bot;
use crate::error::PluginResult;

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, also the key of its configuration section.
    fn name(&self) -> &str;

    /// Registers the plugin's scripts.
    ///
    /// Returning an error aborts startup; recoverable problems should be
    /// logged instead.
    async fn on_load(&self, bot: &Bot) -> PluginResult<()>;
}

/// Type alias for a shared plugin.
pub type BoxedPlugin = Arc<dyn Plugin>;

/// A plugin that can be built from its configuration section.
///
/// The runtime looks up `plugins.<plugin_name()>`, deserializes it into
/// [`Config`](Self::Config), and falls back to `Default` when the section is
/// absent.
pub trait ConfigurablePlugin: Plugin + Sized {
    /// The configuration section type.
    type Config: DeserializeOwned + Default + Send;

    /// Section key under `plugins`.
    fn plugin_name() -> &'static str;

    /// Builds the plugin from its configuration.
    fn from_config(config: Self::Config) -> PluginResult<Self>;
}
