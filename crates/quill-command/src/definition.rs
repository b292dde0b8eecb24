//! Command definitions and the immutable set they are loaded into.
//!
//! One YAML file describes one command:
//!
//! ```yaml
//! name: uptime
//! rule: "^!uptime$"
//! usage: "`!uptime`: host load"
//! version: 1.0
//! cmd:
//!   - uptime
//! ```
//!
//! `cmd` may also be written as `commands`, or as a single string.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use quill_core::RuleSet;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DefinitionError;

/// A named command bound to a trigger pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Rule name and identity of the definition.
    #[serde(default)]
    pub name: String,

    /// Regular expression that triggers the command.
    #[serde(default)]
    pub rule: String,

    #[serde(default)]
    pub usage: String,

    /// Free-form version label; numbers are kept as written.
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    /// Shell lines run in order for each trigger.
    #[serde(
        default,
        rename = "cmd",
        alias = "commands",
        deserialize_with = "one_or_many"
    )]
    pub commands: Vec<String>,
}

impl CommandDefinition {
    /// Creates a definition with no commands.
    pub fn new(name: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rule: rule.into(),
            usage: String::new(),
            version: String::new(),
            commands: Vec::new(),
        }
    }

    /// Appends a command line (builder pattern).
    pub fn command(mut self, line: impl Into<String>) -> Self {
        self.commands.push(line.into());
        self
    }

    /// Sets the usage text (builder pattern).
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Parses a definition from YAML text read from `path`.
    pub fn from_yaml(path: &Path, source: &str) -> Result<Self, DefinitionError> {
        let definition: Self =
            serde_yaml::from_str(source).map_err(|source| DefinitionError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        definition.validate(path)?;
        Ok(definition)
    }

    fn validate(&self, path: &Path) -> Result<(), DefinitionError> {
        let reason = if self.name.trim().is_empty() {
            "missing name"
        } else if self.rule.trim().is_empty() {
            "missing rule"
        } else {
            return Ok(());
        };
        Err(DefinitionError::Invalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(line) => vec![line],
        OneOrMany::Many(lines) => lines,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}

/// The definitions produced by one load, keyed by name.
///
/// Never mutated after construction; a reload builds a new set and the
/// serving script is swapped as a whole.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    definitions: BTreeMap<String, Arc<CommandDefinition>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, returning the one it replaced.
    pub fn insert(&mut self, definition: CommandDefinition) -> Option<Arc<CommandDefinition>> {
        self.definitions
            .insert(definition.name.clone(), Arc::new(definition))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CommandDefinition>> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandDefinition>> {
        self.definitions.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    /// One rule per definition: `name -> rule`, in name order.
    pub fn ruleset(&self) -> RuleSet {
        self.iter()
            .map(|d| (d.name.clone(), d.rule.clone()))
            .collect()
    }

    /// Help text listing every definition's usage.
    pub fn usage(&self) -> String {
        self.iter()
            .map(|d| format!("\n> {}\n\n", d.usage))
            .collect()
    }
}

impl FromIterator<CommandDefinition> for CommandSet {
    fn from_iter<I: IntoIterator<Item = CommandDefinition>>(iter: I) -> Self {
        let mut set = Self::new();
        for definition in iter {
            set.insert(definition);
        }
        set
    }
}
