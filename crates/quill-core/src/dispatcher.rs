//! Rule matcher and dispatcher.
//!
//! The [`Dispatcher`] receives one incoming [`Message`] per inbound event and:
//!
//! 1. Takes the current registry [`Snapshot`](crate::registry::Snapshot)
//! 2. Tests the text against every compiled rule, scripts in registration
//!    order and rules in rule-set order, stopping at the first match
//! 3. Records the matched rule name in the `rule` header
//! 4. Invokes the owning script's action
//! 5. Forwards every returned message to the outgoing sink, in order
//!
//! A message that matches nothing is dropped silently. An action that fails
//! (or panics) produces exactly one reply to the sender carrying the error
//! text, so script authors always get visible feedback.
//!
//! ```rust,ignore
//! let registry = Arc::new(ScriptRegistry::new());
//! registry.register("ping", ping_script);
//!
//! let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::new(sink));
//! dispatcher.dispatch(Message::new("!ping", "alice")).await;
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, Level, debug, error, span, trace, warn};

use crate::bot::{Bot, BoxedOutgoing};
use crate::error::ScriptError;
use crate::message::{Message, RULE_HEADER};
use crate::registry::ScriptRegistry;

/// What a dispatch did, when a rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Name of the script whose action ran.
    pub script: String,
    /// Name of the rule that matched.
    pub rule: String,
    /// Number of messages forwarded after the action returned.
    pub replies: usize,
    /// Whether the action failed (its error was sent as the only reply).
    pub failed: bool,
}

/// Routes incoming messages to the first matching script.
///
/// `Dispatcher` is cheap to clone and `Send + Sync`; independent dispatches
/// may run concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ScriptRegistry>,
    bot: Bot,
}

impl Dispatcher {
    /// Creates a dispatcher reading `registry` and delivering to `outgoing`.
    pub fn new(registry: Arc<ScriptRegistry>, outgoing: BoxedOutgoing) -> Self {
        let bot = Bot::new(Arc::clone(&registry), outgoing);
        Self { registry, bot }
    }

    /// Creates a dispatcher from an existing bot context.
    pub fn from_bot(bot: Bot) -> Self {
        Self {
            registry: Arc::clone(bot.registry()),
            bot,
        }
    }

    /// The bot context handed to actions.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The registry this dispatcher reads.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Dispatches one incoming message.
    ///
    /// Returns `None` when no rule matched; in that case nothing is sent.
    pub async fn dispatch(&self, incoming: Message) -> Option<Matched> {
        let span = span!(Level::DEBUG, "dispatch", from = %incoming.from);
        self.dispatch_inner(incoming).instrument(span).await
    }

    async fn dispatch_inner(&self, mut incoming: Message) -> Option<Matched> {
        let snapshot = self.registry.snapshot();

        let Some((entry, rule)) = snapshot.find(&incoming.text) else {
            trace!(text = %incoming.text, "No rule matched");
            return None;
        };

        let script = entry.name().to_string();
        let rule = rule.name().to_string();
        let action = Arc::clone(entry.script().action());
        drop(snapshot);

        debug!(script = %script, rule = %rule, "Rule matched, invoking action");

        incoming.header.set(RULE_HEADER, rule.clone());
        let sender = incoming.from.clone();

        let outcome = AssertUnwindSafe(action.call(self.bot.clone(), incoming))
            .catch_unwind()
            .await;

        let (replies, failed) = match outcome {
            Ok(Ok(replies)) => (replies, false),
            Ok(Err(e)) => {
                warn!(script = %script, rule = %rule, error = %e, "Action failed");
                (vec![Message::new(e.to_string(), sender)], true)
            }
            Err(payload) => {
                let e = ScriptError::Panicked {
                    script: script.clone(),
                    reason: panic_reason(payload.as_ref()),
                };
                error!(script = %script, rule = %rule, error = %e, "Action panicked");
                (vec![Message::new(e.to_string(), sender)], true)
            }
        };

        let count = replies.len();
        for reply in replies {
            self.bot.send(reply).await;
        }

        Some(Matched {
            script,
            rule,
            replies: count,
            failed,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("script_count", &self.registry.len())
            .finish()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Outgoing;
    use crate::script::Script;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<Message>>,
    }

    impl CollectingSink {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|m| m.text.clone()).collect()
        }
    }

    #[async_trait]
    impl Outgoing for CollectingSink {
        async fn deliver(&self, message: Message) {
            self.sent.lock().push(message);
        }
    }

    fn setup() -> (Arc<ScriptRegistry>, Arc<CollectingSink>, Dispatcher) {
        let registry = Arc::new(ScriptRegistry::new());
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), sink.clone());
        (registry, sink, dispatcher)
    }

    fn echo_rule_script() -> Script {
        Script::new(|_bot: Bot, incoming: Message| async move {
            let rule = incoming.rule().unwrap_or_default().to_string();
            Ok(vec![incoming.reply(format!("{rule}: {}", incoming.text))])
        })
    }

    #[tokio::test]
    async fn test_dispatch_no_scripts() {
        let (_registry, sink, dispatcher) = setup();
        let matched = dispatcher.dispatch(Message::new("hello", "alice")).await;
        assert!(matched.is_none());
        assert!(sink.texts().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_sets_rule_header_and_replies_to_sender() {
        let (registry, sink, dispatcher) = setup();
        registry.register("greet", echo_rule_script().rule("hello", "^hello"));

        let matched = dispatcher
            .dispatch(Message::new("hello world", "alice"))
            .await
            .unwrap();

        assert_eq!(matched.script, "greet");
        assert_eq!(matched.rule, "hello");
        assert_eq!(matched.replies, 1);
        assert!(!matched.failed);

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hello: hello world");
        assert_eq!(sent[0].from, "alice");
    }

    #[tokio::test]
    async fn test_first_match_wins_across_scripts() {
        let (registry, sink, dispatcher) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        registry.register(
            "first",
            Script::new(move |_bot: Bot, incoming: Message| {
                let c = Arc::clone(&c1);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![incoming.reply("first")])
                }
            })
            .rule("any", "."),
        );

        let c2 = Arc::clone(&calls);
        registry.register(
            "second",
            Script::new(move |_bot: Bot, incoming: Message| {
                let c = Arc::clone(&c2);
                async move {
                    c.fetch_add(10, Ordering::SeqCst);
                    Ok(vec![incoming.reply("second")])
                }
            })
            .rule("any2", "."),
        );

        dispatcher.dispatch(Message::new("x", "bob")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.texts(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_rules_within_script_tried_in_order() {
        let (registry, _sink, dispatcher) = setup();
        registry.register(
            "s",
            echo_rule_script().rule("specific", "^!deploy prod").rule("generic", "^!deploy"),
        );

        let matched = dispatcher
            .dispatch(Message::new("!deploy prod", "ops"))
            .await
            .unwrap();
        assert_eq!(matched.rule, "specific");

        let matched = dispatcher
            .dispatch(Message::new("!deploy staging", "ops"))
            .await
            .unwrap();
        assert_eq!(matched.rule, "generic");
    }

    #[tokio::test]
    async fn test_action_error_becomes_single_reply() {
        let (registry, sink, dispatcher) = setup();
        registry.register(
            "failing",
            Script::new(|_bot: Bot, _incoming: Message| async move {
                Err(ScriptError::other("disk on fire"))
            })
            .rule("f", "^fail"),
        );

        let matched = dispatcher.dispatch(Message::new("fail now", "carol")).await.unwrap();

        assert!(matched.failed);
        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "disk on fire");
        assert_eq!(sent[0].from, "carol");
    }

    #[tokio::test]
    async fn test_action_panic_is_contained() {
        let (registry, sink, dispatcher) = setup();
        registry.register(
            "boom",
            Script::new(|_bot: Bot, _incoming: Message| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(Vec::new())
            })
            .rule("b", "^boom"),
        );

        let matched = dispatcher.dispatch(Message::new("boom", "dave")).await.unwrap();

        assert!(matched.failed);
        assert_eq!(sink.texts(), vec!["script 'boom' panicked: kaboom"]);

        // The dispatcher keeps working afterwards.
        registry.register("ok", echo_rule_script().rule("ok", "^ok"));
        assert!(dispatcher.dispatch(Message::new("ok", "dave")).await.is_some());
    }

    #[tokio::test]
    async fn test_bot_send_precedes_returned_messages() {
        let (registry, sink, dispatcher) = setup();
        registry.register(
            "multi",
            Script::new(|bot: Bot, incoming: Message| async move {
                bot.send(incoming.reply("streamed")).await;
                Ok(vec![incoming.reply("returned 1"), incoming.reply("returned 2")])
            })
            .rule("m", "^multi"),
        );

        dispatcher.dispatch(Message::new("multi", "erin")).await;

        assert_eq!(sink.texts(), vec!["streamed", "returned 1", "returned 2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_sees_whole_scripts_during_reregistration() {
        fn versioned(version: &'static str) -> Script {
            Script::new(move |_bot: Bot, incoming: Message| async move {
                Ok(vec![incoming.reply(version)])
            })
            .rule(version, "^x")
        }

        let (registry, sink, dispatcher) = setup();
        registry.register("s", versioned("v1"));

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..200 {
                    let version = if i % 2 == 0 { "v2" } else { "v1" };
                    registry.register("s", versioned(version));
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for r in 0..8 {
            let dispatcher = dispatcher.clone();
            readers.push(tokio::spawn(async move {
                let mut routed = Vec::new();
                for i in 0..50 {
                    let from = format!("r{r}-{i}");
                    let matched = dispatcher
                        .dispatch(Message::new("x", from.clone()))
                        .await
                        .unwrap();
                    routed.push((from, matched.rule));
                }
                routed
            }));
        }

        writer.await.unwrap();
        let mut routed = Vec::new();
        for reader in readers {
            routed.extend(reader.await.unwrap());
        }

        // Each reply was produced by the action registered with the rule that routed it.
        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 400);
        for (from, rule) in routed {
            let reply = sent.iter().find(|m| m.from == from).unwrap();
            assert_eq!(reply.text, rule);
        }
    }

    #[tokio::test]
    async fn test_replaced_script_old_rules_no_longer_match() {
        let (registry, sink, dispatcher) = setup();
        registry.register("s", echo_rule_script().rule("old", "^old"));
        registry.register("s", echo_rule_script().rule("new", "^new"));

        assert!(dispatcher.dispatch(Message::new("old", "f")).await.is_none());
        assert!(dispatcher.dispatch(Message::new("new", "f")).await.is_some());
        assert_eq!(sink.texts(), vec!["new: new"]);
    }
}
