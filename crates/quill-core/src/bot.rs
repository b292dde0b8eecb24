//! Bot context and outgoing delivery.
//!
//! The core never talks to a chat network itself. Replies leave through an
//! [`Outgoing`] sink supplied by the embedding application; whether delivery
//! succeeds is not reported back to the core.
//!
//! A [`Bot`] is the handle every action receives. It bundles the sink with the
//! [`ScriptRegistry`] so that plugins can re-register their scripts at runtime
//! (this is how the command plugin reloads).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::message::Message;
use crate::registry::ScriptRegistry;

/// Delivery collaborator for outgoing messages.
#[async_trait]
pub trait Outgoing: Send + Sync {
    /// Hands `message` over for delivery to `message.from`.
    async fn deliver(&self, message: Message);
}

/// Type alias for a shared outgoing sink.
pub type BoxedOutgoing = Arc<dyn Outgoing>;

/// An [`Outgoing`] sink backed by an unbounded tokio channel.
///
/// The receiving half is typically drained by a transport task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes delivered messages.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing sender.
    pub fn from_sender(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Outgoing for ChannelSink {
    async fn deliver(&self, message: Message) {
        if let Err(e) = self.tx.send(message) {
            warn!(to = %e.0.from, "Outgoing channel closed, dropping message");
        }
    }
}

/// Context handed to every action invocation.
///
/// Cloning is cheap: both fields are reference counted.
#[derive(Clone)]
pub struct Bot {
    registry: Arc<ScriptRegistry>,
    outgoing: BoxedOutgoing,
}

impl Bot {
    /// Creates a bot bound to `registry` that delivers through `outgoing`.
    pub fn new(registry: Arc<ScriptRegistry>, outgoing: BoxedOutgoing) -> Self {
        Self { registry, outgoing }
    }

    /// Sends a message immediately, ahead of whatever the action returns.
    pub async fn send(&self, message: Message) {
        self.outgoing.deliver(message).await;
    }

    /// The registry this bot dispatches against.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// The outgoing sink.
    pub fn outgoing(&self) -> &BoxedOutgoing {
        &self.outgoing
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("scripts", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        let bot = Bot::new(Arc::new(ScriptRegistry::new()), Arc::new(sink));

        bot.send(Message::new("one", "alice")).await;
        bot.send(Message::new("two", "alice")).await;

        assert_eq!(rx.recv().await.map(|m| m.text), Some("one".to_string()));
        assert_eq!(rx.recv().await.map(|m| m.text), Some("two".to_string()));
    }

    #[test]
    fn test_channel_sink_closed_does_not_panic() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        tokio_test::block_on(sink.deliver(Message::new("lost", "bob")));
    }
}
