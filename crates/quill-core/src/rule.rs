//! Rules and rule sets.
//!
//! A [`RuleSet`] maps rule names to regular-expression patterns. Patterns are
//! kept as source text until the owning script is registered; the registry
//! then compiles them into [`CompiledRule`]s. A pattern that does not compile
//! is dropped from matching (and logged) without affecting its siblings.

use regex::Regex;
use tracing::warn;

/// A named regular-expression trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Unique name within the owning rule set.
    pub name: String,
    /// Regular expression tested against the message text.
    pub pattern: String,
}

/// An ordered collection of rules with unique names.
///
/// Insertion order is the order in which the dispatcher tries the rules.
/// Inserting a name that already exists replaces its pattern in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Inserts or replaces a rule, returning the previous pattern.
    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) -> Option<String> {
        let name = name.into();
        let pattern = pattern.into();

        if let Some(existing) = self.rules.iter_mut().find(|r| r.name == name) {
            return Some(std::mem::replace(&mut existing.pattern, pattern));
        }

        self.rules.push(Rule { name, pattern });
        None
    }

    /// Adds a rule (builder pattern).
    pub fn with(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.insert(name, pattern);
        self
    }

    /// Returns the pattern registered under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over rules in match order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Compiles every rule, skipping (and logging) patterns that are invalid.
    pub(crate) fn compile(&self, script: &str) -> Vec<CompiledRule> {
        self.rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(regex) => Some(CompiledRule {
                    name: rule.name.clone(),
                    regex,
                }),
                Err(e) => {
                    warn!(
                        script = %script,
                        rule = %rule.name,
                        pattern = %rule.pattern,
                        error = %e,
                        "Rule pattern failed to compile, excluding it from matching"
                    );
                    None
                }
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, pattern) in iter {
            set.insert(name, pattern);
        }
        set
    }
}

/// Renders a trigger pattern as the text a user types.
///
/// Strips a leading `^` and an unescaped trailing `$`; the rest is shown as
/// written.
pub fn trigger_hint(pattern: &str) -> &str {
    let text = pattern.strip_prefix('^').unwrap_or(pattern);
    match text.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => text,
    }
}

/// A rule whose pattern compiled successfully.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    regex: Regex,
}

impl CompiledRule {
    /// The rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Tests the pattern against `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}
