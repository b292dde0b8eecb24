//! # Quill Core
//!
//! The rule registry and dispatch engine of the Quill bot host.
//!
//! ## Building Blocks
//!
//! - **Messages**: text, sender address and a header bag ([`Message`], [`Header`])
//! - **Scripts**: a rule set plus an action ([`Script`], [`RuleSet`], [`Action`])
//! - **Registry**: named scripts published as immutable snapshots ([`ScriptRegistry`])
//! - **Dispatcher**: first-match routing of one message to one action ([`Dispatcher`])
//! - **Delivery**: the outgoing sink collaborator ([`Outgoing`], [`ChannelSink`])
//! - **Plugins**: startup hooks that register scripts ([`Plugin`])
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐    ┌────────────┐    ┌──────────────────┐    ┌──────────┐
//! │ Inbound  │───▶│ Dispatcher │───▶│ Script "cmd"     │───▶│ Outgoing │
//! │ (text,   │    │ (snapshot, │    │ Script "help"    │    │  sink    │
//! │  from)   │    │ first hit) │    │ Script ...       │    │          │
//! └──────────┘    └────────────┘    └──────────────────┘    └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quill_core::{Bot, ChannelSink, Dispatcher, Message, Script, ScriptRegistry};
//!
//! let registry = Arc::new(ScriptRegistry::new());
//! registry.register(
//!     "ping",
//!     Script::new(|_bot: Bot, incoming: Message| async move {
//!         Ok(vec![incoming.reply("pong")])
//!     })
//!     .rule("ping", r"^!ping$"),
//! );
//!
//! let (sink, mut replies) = ChannelSink::new();
//! let dispatcher = Dispatcher::new(registry, Arc::new(sink));
//! dispatcher.dispatch(Message::new("!ping", "alice")).await;
//! assert_eq!(replies.recv().await.unwrap().text, "pong");
//! ```

pub mod bot;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod plugin;
pub mod registry;
pub mod rule;
pub mod script;

pub use bot::{Bot, BoxedOutgoing, ChannelSink, Outgoing};
pub use dispatcher::{Dispatcher, Matched};
pub use error::{PluginError, PluginResult, ScriptError};
pub use message::{Header, Message, RULE_HEADER};
pub use plugin::{BoxedPlugin, ConfigurablePlugin, Plugin};
pub use registry::{RegisteredScript, RuleEntry, ScriptRegistry, Snapshot};
pub use rule::{CompiledRule, Rule, RuleSet, trigger_hint};
pub use script::{Action, ActionResult, BoxedAction, Script};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Action, ActionResult, Bot, ConfigurablePlugin, Dispatcher, Message, Outgoing, Plugin,
        PluginError, Script, ScriptError, ScriptRegistry,
    };
}
