//! Process-wide script registry.
//!
//! [`ScriptRegistry`] owns every registered [`Script`]. It is shared between
//! the dispatcher (many concurrent readers) and plugins that re-register
//! their scripts at runtime (occasional writers).
//!
//! # Concurrency
//!
//! The registry publishes immutable [`Snapshot`]s. Readers clone the current
//! `Arc<Snapshot>` under a short read lock and then work lock-free, so a
//! dispatch always sees one complete table: either the one before a
//! registration or the one after it, never a mixture. Writers are serialized
//! by a separate mutex, copy the current table, apply their change and swap
//! the new snapshot in.
//!
//! # Ordering and duplicates
//!
//! Scripts are kept in registration order; re-registering a name replaces the
//! entry in place and keeps its position. Rule names only need to be unique
//! inside one script. When two scripts declare the same rule name, matching is
//! still first-match in registration order and the action invoked is always
//! the owner of the rule that matched; a warning is logged at registration.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::rule::CompiledRule;
use crate::script::Script;

/// A registered script together with its compiled rules.
#[derive(Debug)]
pub struct RegisteredScript {
    name: String,
    script: Script,
    rules: Vec<CompiledRule>,
}

impl RegisteredScript {
    /// The registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The script as it was registered.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The rules that compiled, in match order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// An immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: Vec<Arc<RegisteredScript>>,
}

impl Snapshot {
    /// Finds the first rule whose pattern matches `text`.
    ///
    /// Scripts are tried in registration order, rules in rule-set order.
    pub fn find(&self, text: &str) -> Option<(&Arc<RegisteredScript>, &CompiledRule)> {
        self.entries.iter().find_map(|entry| {
            entry
                .rules
                .iter()
                .find(|rule| rule.is_match(text))
                .map(|rule| (entry, rule))
        })
    }

    /// Looks up a script by name.
    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredScript>> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Iterates over scripts in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredScript>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A `(script, rule, pattern)` triple as reported by [`ScriptRegistry::all_rules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    /// Owning script.
    pub script: String,
    /// Rule name.
    pub rule: String,
    /// Source pattern.
    pub pattern: String,
}

/// Registry of named scripts with snapshot-swap publication.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    current: RwLock<Arc<Snapshot>>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
}

impl ScriptRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Stores `script` under `name`, replacing any previous script wholesale.
    ///
    /// Rule patterns are compiled here; invalid ones are logged and left out
    /// of matching. Returns `true` if an existing script was replaced.
    pub fn register(&self, name: impl Into<String>, script: Script) -> bool {
        let name = name.into();
        let rules = script.ruleset.compile(&name);

        let _guard = self.writer.lock();
        let current = self.snapshot();

        for rule in &rules {
            if let Some(other) = current
                .iter()
                .find(|e| e.name != name && e.rules.iter().any(|r| r.name() == rule.name()))
            {
                warn!(
                    script = %name,
                    rule = %rule.name(),
                    other_script = %other.name,
                    "Rule name already used by another script"
                );
            }
        }

        let entry = Arc::new(RegisteredScript {
            name: name.clone(),
            script,
            rules,
        });

        let mut entries = current.entries.clone();
        let replaced = match entries.iter().position(|e| e.name == name) {
            Some(pos) => {
                entries[pos] = Arc::clone(&entry);
                true
            }
            None => {
                entries.push(Arc::clone(&entry));
                false
            }
        };

        *self.current.write() = Arc::new(Snapshot { entries });

        if replaced {
            info!(script = %name, rules = entry.rules.len(), "Script replaced");
        } else {
            info!(script = %name, rules = entry.rules.len(), "Script registered");
        }

        replaced
    }

    /// Removes the script registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        let _guard = self.writer.lock();
        let current = self.snapshot();

        if current.get(name).is_none() {
            return false;
        }

        let entries = current
            .entries
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        *self.current.write() = Arc::new(Snapshot { entries });

        debug!(script = %name, "Script unregistered");
        true
    }

    /// Returns every active rule in dispatch order.
    pub fn all_rules(&self) -> Vec<RuleEntry> {
        self.snapshot()
            .iter()
            .flat_map(|entry| {
                entry.rules.iter().map(|rule| RuleEntry {
                    script: entry.name.clone(),
                    rule: rule.name().to_string(),
                    pattern: rule.pattern().to_string(),
                })
            })
            .collect()
    }

    /// Returns the registered script names in registration order.
    pub fn script_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|e| e.name.clone()).collect()
    }

    /// Returns `true` if a script is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Concatenates the description and usage of every script.
    ///
    /// Scripts with neither are left out.
    pub fn help(&self) -> String {
        self.snapshot()
            .iter()
            .filter_map(|entry| {
                let description = entry.script.description.trim();
                let usage = entry.script.usage.trim();
                if description.is_empty() && usage.is_empty() {
                    return None;
                }

                let mut section = format!("[{}]", entry.name);
                if !description.is_empty() {
                    section.push(' ');
                    section.push_str(description);
                }
                if !usage.is_empty() {
                    section.push('\n');
                    section.push_str(usage);
                }
                Some(section)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
