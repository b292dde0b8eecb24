//! Loading command definitions from a directory.
//!
//! Every `*.yml` and `*.yaml` file directly inside the directory is parsed as
//! one [`CommandDefinition`]. Files are processed in path order, so when two
//! files declare the same name the later one wins. Bad files are skipped with
//! a warning; the load only fails when nothing usable remains.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use tracing::{debug, info, warn};

use crate::definition::{CommandDefinition, CommandSet};
use crate::error::{DefinitionError, LoadError};

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Reads and validates a single definition file.
pub fn load_definition_file(path: &Path) -> Result<CommandDefinition, DefinitionError> {
    let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CommandDefinition::from_yaml(path, &source)
}

/// Lists the definition files in `dir`, sorted by path.
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let base = Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();

    for ext in EXTENSIONS {
        let pattern = format!("{base}/*.{ext}");
        for entry in glob(&pattern)? {
            match entry {
                Ok(path) => files.push(path),
                Err(e) => warn!(error = %e, "Skipping unreadable definition entry"),
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Loads every usable definition in `dir`.
///
/// Returns [`LoadError::NoCommands`] when the directory is missing, empty, or
/// holds only invalid files.
pub fn load_definitions(dir: &Path) -> Result<CommandSet, LoadError> {
    let mut set = CommandSet::new();

    for path in definition_files(dir)? {
        match load_definition_file(&path) {
            Ok(definition) => {
                if definition.commands.is_empty() {
                    warn!(path = %path.display(), name = %definition.name, "Definition has no commands");
                }
                debug!(path = %path.display(), name = %definition.name, "Loaded command definition");
                if let Some(previous) = set.insert(definition) {
                    warn!(
                        path = %path.display(),
                        name = %previous.name,
                        "Duplicate command name, later file wins"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Skipping command definition"),
        }
    }

    if set.is_empty() {
        return Err(LoadError::NoCommands {
            dir: dir.to_path_buf(),
        });
    }

    info!(dir = %dir.display(), count = set.len(), "Command definitions loaded");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, file: &str, contents: &str) {
        fs::write(dir.join(file), contents).unwrap();
    }

    #[test]
    fn test_valid_files_loaded_and_bad_ones_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.yml", "name: a\nrule: ^!a\ncmd: [echo a]\n");
        write(tmp.path(), "b.yaml", "name: b\nrule: ^!b\ncmd: [echo b]\n");
        write(tmp.path(), "broken.yml", "name: [oops\n");
        write(tmp.path(), "nameless.yml", "rule: ^!c\n");
        write(tmp.path(), "notes.txt", "name: txt\nrule: ^!t\n");

        let set = load_definitions(tmp.path()).unwrap();

        assert_eq!(set.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_later_file_wins_on_duplicate_name() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "1-first.yml", "name: dup\nrule: ^first\n");
        write(tmp.path(), "2-second.yml", "name: dup\nrule: ^second\n");

        let set = load_definitions(tmp.path()).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("dup").map(|d| d.rule.as_str()), Some("^second"));
    }

    #[test]
    fn test_empty_or_missing_dir_is_no_commands() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_definitions(tmp.path()),
            Err(LoadError::NoCommands { .. })
        ));

        let missing = tmp.path().join("missing");
        assert!(matches!(
            load_definitions(&missing),
            Err(LoadError::NoCommands { .. })
        ));
    }

    #[test]
    fn test_only_invalid_files_is_no_commands() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "bad.yml", "- just\n- a list\n");

        assert!(matches!(
            load_definitions(tmp.path()),
            Err(LoadError::NoCommands { .. })
        ));
    }

    #[test]
    fn test_glob_metacharacters_in_dir_are_literal() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("cmd[1]");
        fs::create_dir(&dir).unwrap();
        write(&dir, "x.yml", "name: x\nrule: ^x\n");

        assert_eq!(load_definitions(&dir).unwrap().names(), vec!["x"]);
    }
}
