//! Message envelope types for the Quill host.
//!
//! A [`Message`] is the unit that flows through the whole system: the inbound
//! collaborator creates one per received event, actions create one per reply,
//! and the outgoing sink consumes them.
//!
//! # Header
//!
//! Every message carries a free-form [`Header`] bag. The dispatcher writes
//! [`RULE_HEADER`] before invoking an action so the action knows which of its
//! rules fired.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Header key under which the dispatcher records the matched rule name.
pub const RULE_HEADER: &str = "rule";

// ============================================================================
// Header
// ============================================================================

/// An extensible key/value bag attached to a [`Message`].
///
/// Keys are kept sorted so that debug output and serialization are stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    entries: BTreeMap<String, String>,
}

impl Header {
    /// Creates an empty header.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Header {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A textual chat message with a sender address and a header bag.
///
/// `from` is opaque to the core: it is whatever the inbound collaborator uses
/// to identify the conversation, and replies are addressed back to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Raw text content.
    pub text: String,
    /// Sender (inbound) or recipient (outgoing) address.
    pub from: String,
    /// Free-form header bag.
    #[serde(default, skip_serializing_if = "Header::is_empty")]
    pub header: Header,
}

impl Message {
    /// Creates a message with an empty header.
    pub fn new(text: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from: from.into(),
            header: Header::new(),
        }
    }

    /// Creates a reply addressed back to this message's sender.
    ///
    /// The reply starts with an empty header; nothing from the incoming
    /// header is carried over.
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self::new(text, self.from.clone())
    }

    /// Adds a header entry (builder pattern).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.set(key, value);
        self
    }

    /// Returns the rule name recorded by the dispatcher, if any.
    pub fn rule(&self) -> Option<&str> {
        self.header.get(RULE_HEADER)
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
