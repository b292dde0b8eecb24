//! # Quill
//!
//! A chat-bot host that routes each incoming message to the first script
//! whose rule matches it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌───────────────────────────────┐
//! │   Runtime   │────▶│ Dispatcher │────▶│ Script "refresh_cmd"          │
//! │  (inbound   │     │ (snapshot, │────▶│ Script "cmd"  ──▶ /bin/sh -c  │──▶ Outgoing
//! │   queue)    │     │ first hit) │────▶│ Script "help"                 │
//! └─────────────┘     └────────────┘     └───────────────────────────────┘
//! ```
//!
//! - **Runtime**: configuration, logging, plugin bootstrap, serve loop
//! - **Registry**: named scripts published as immutable snapshots
//! - **Plugins**: register scripts at startup and may re-register them later
//! - **Command plugin**: YAML-declared shell commands, reloadable at runtime
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quill::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = QuillRuntime::new();
//!     runtime.register_configured::<CommandPlugin>().await?;
//!
//!     let (tx, rx) = runtime.inbound_channel();
//!     let (sink, mut replies) = ChannelSink::new();
//!     tokio::spawn(async move {
//!         while let Some(reply) = replies.recv().await {
//!             println!("{}: {}", reply.from, reply.text);
//!         }
//!     });
//!     tx.send(Message::new("!help", "console")).await?;
//!     runtime.serve(rx, Arc::new(sink)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `command` *(default)*: the shell command plugin
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

#[cfg(feature = "command")]
pub use quill_command as command;
pub use quill_core as core;
pub use quill_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime
    pub use quill_runtime::{QuillConfig, QuillRuntime, RuntimeError, RuntimeResult};

    // Core model
    pub use quill_core::{
        Action, ActionResult, Bot, BoxedOutgoing, ChannelSink, ConfigurablePlugin, Dispatcher,
        Matched, Message, Outgoing, Plugin, PluginError, PluginResult, RuleSet, Script,
        ScriptError, ScriptRegistry,
    };

    // Command plugin
    #[cfg(feature = "command")]
    pub use quill_command::{CommandConfig, CommandDefinition, CommandPlugin};

    // Logging macros
    pub use quill_runtime::prelude::*;
}
