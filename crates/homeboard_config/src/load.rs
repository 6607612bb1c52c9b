use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use crate::Diagnostic;
use crate::Error;
use crate::LoadError;
use crate::MergeError;
use crate::SourceInfo;
use crate::SourceSpan;
use crate::Warning;

/// One parsed config file, before merging.
///
/// Implementors are plain `Deserialize` structs whose fields are all optional,
/// with an `imports` list and a skipped slot for the file's source.
pub trait PartialFile: DeserializeOwned {
    /// Paths listed under `imports = [...]`, as written
    fn imports(&self) -> &[String];

    /// Remember where this file came from, for diagnostics
    fn attach_source(&mut self, source: SourceInfo);

    /// Whether the file defines nothing at all
    fn is_empty(&self) -> bool;
}

/// Load a single config file without processing imports
pub fn load_file<P: PartialFile>(path: &Path) -> Result<P, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut partial: P = toml::from_str(&content).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    partial.attach_source(SourceInfo {
        file_path: path.to_path_buf(),
        content,
    });

    Ok(partial)
}

/// Load config files with import resolution
///
/// Imports are loaded depth-first and come before the file that imports them.
/// Relative imports resolve against the importing file's directory.
pub fn load_with_imports<P: PartialFile>(paths: &[PathBuf]) -> Result<Vec<P>, LoadError> {
    let mut visited = HashSet::new();
    let mut all = Vec::new();

    for path in paths {
        load_recursive(path, &mut visited, &mut all)?;
    }

    Ok(all)
}

fn load_recursive<P: PartialFile>(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    configs: &mut Vec<P>,
) -> Result<(), LoadError> {
    let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    if visited.contains(&canonical_path) {
        return Err(LoadError::ImportCycle {
            path: canonical_path.clone(),
            cycle: visited.iter().cloned().collect(),
        });
    }
    visited.insert(canonical_path.clone());

    let config: P = load_file(path)?;

    for import in config.imports() {
        let import_path = PathBuf::from(import);
        let resolved = if import_path.is_absolute() {
            import_path
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(import_path)
        };
        load_recursive(&resolved, visited, configs)?;
    }

    configs.push(config);

    // Sibling branches may import the same file
    visited.remove(&canonical_path);

    Ok(())
}

/// First-wins bookkeeping for merging scalar fields across files.
///
/// The first file to assign a field keeps it. Later assignments are recorded
/// as merge conflicts, and merging carries on so every conflict is reported
/// at once.
#[derive(Debug, Default)]
pub struct FirstWins {
    claimed: HashMap<String, SourceSpan>,
    diagnostics: Vec<Diagnostic>,
}

impl FirstWins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `value` for `field_path`; stores it in `slot` if nobody got there first
    pub fn claim<T>(
        &mut self,
        field_path: &str,
        what: &str,
        slot: &mut Option<T>,
        value: T,
        at: SourceSpan,
    ) {
        if let Some(previous) = self.claimed.get(field_path) {
            self.diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path: field_path.to_string(),
                message: format!("{} defined in multiple config files", what),
                conflicts: vec![previous.clone(), at],
            })));
        } else {
            *slot = Some(value);
            self.claimed.insert(field_path.to_string(), at);
        }
    }

    /// Record that a file contributed nothing
    pub fn empty_file(&mut self, file_path: PathBuf) {
        self.diagnostics
            .push(Diagnostic::Warning(Warning::EmptyConfig { file_path }));
    }

    /// Where a field was first defined, if it was
    pub fn location(&self, field_path: &str) -> Option<&SourceSpan> {
        self.claimed.get(field_path)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(file: &str) -> SourceSpan {
        SourceSpan {
            file_path: PathBuf::from(file),
            span: 0..1,
            content: "x".to_string(),
        }
    }

    #[test]
    fn test_first_wins_keeps_first_value() {
        let mut merger = FirstWins::new();
        let mut slot = None;

        merger.claim("hub.url", "Hub URL", &mut slot, "a", span("a.toml"));
        merger.claim("hub.url", "Hub URL", &mut slot, "b", span("b.toml"));

        assert_eq!(slot, Some("a"));
        assert_eq!(
            merger.location("hub.url").map(|s| s.file_path.clone()),
            Some(PathBuf::from("a.toml"))
        );

        let diagnostics = merger.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::Error(Error::Merge(err)) => {
                assert_eq!(err.field_path, "hub.url");
                assert_eq!(err.conflicts.len(), 2);
                assert_eq!(err.message, "Hub URL defined in multiple config files");
            }
            other => panic!("Expected merge error, got {:?}", other),
        }
    }

    #[test]
    fn test_distinct_fields_do_not_conflict() {
        let mut merger = FirstWins::new();
        let mut url = None;
        let mut token = None;

        merger.claim("hub.url", "Hub URL", &mut url, 1, span("a.toml"));
        merger.claim("hub.token", "Hub token", &mut token, 2, span("b.toml"));

        assert_eq!(url, Some(1));
        assert_eq!(token, Some(2));
        assert!(merger.into_diagnostics().is_empty());
    }
}
