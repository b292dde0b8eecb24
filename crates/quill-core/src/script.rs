//! Scripts: a rule set bundled with the action that serves it.
//!
//! Plugins are plain data. A [`Script`] carries a [`RuleSet`], an [`Action`]
//! and some help text; it is registered into the
//! [`ScriptRegistry`](crate::registry::ScriptRegistry) under a name and
//! replaced wholesale when registered again.
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_core::{Bot, Message, Script};
//!
//! let ping = Script::new(|_bot: Bot, incoming: Message| async move {
//!     Ok(vec![incoming.reply("pong")])
//! })
//! .rule("ping", r"^!ping$")
//! .usage("`!ping`: liveness check");
//!
//! registry.register("ping", ping);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::Bot;
use crate::error::ScriptError;
use crate::message::Message;
use crate::rule::RuleSet;

/// Outcome of an action: zero or more replies, or a failure.
pub type ActionResult = Result<Vec<Message>, ScriptError>;

/// The capability "consume a message, produce zero or more messages or fail".
///
/// Implemented automatically for async closures taking `(Bot, Message)`.
#[async_trait]
pub trait Action: Send + Sync {
    /// Handles `incoming`, whose header already carries the matched rule.
    async fn call(&self, bot: Bot, incoming: Message) -> ActionResult;
}

#[async_trait]
impl<F, Fut> Action for F
where
    F: Fn(Bot, Message) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult> + Send,
{
    async fn call(&self, bot: Bot, incoming: Message) -> ActionResult {
        (self)(bot, incoming).await
    }
}

/// Type alias for a shared, type-erased action.
pub type BoxedAction = Arc<dyn Action>;

/// A named plugin entry: rules, action and help text.
#[derive(Clone)]
pub struct Script {
    pub(crate) ruleset: RuleSet,
    pub(crate) action: BoxedAction,
    pub(crate) usage: String,
    pub(crate) description: String,
}

impl Script {
    /// Creates a script with no rules around `action`.
    pub fn new<A>(action: A) -> Self
    where
        A: Action + 'static,
    {
        Self::from_boxed(Arc::new(action))
    }

    /// Creates a script from an already shared action.
    pub fn from_boxed(action: BoxedAction) -> Self {
        Self {
            ruleset: RuleSet::new(),
            action,
            usage: String::new(),
            description: String::new(),
        }
    }

    /// Adds a rule (builder pattern).
    pub fn rule(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.ruleset.insert(name, pattern);
        self
    }

    /// Replaces the whole rule set.
    pub fn ruleset(mut self, ruleset: RuleSet) -> Self {
        self.ruleset = ruleset;
        self
    }

    /// Sets the usage text shown by the help surface.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Sets the description shown by the help surface.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn get_ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    pub fn get_usage(&self) -> &str {
        &self.usage
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// The action invoked when one of the rules matches.
    pub fn action(&self) -> &BoxedAction {
        &self.action
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("ruleset", &self.ruleset)
            .field("usage", &self.usage)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
