//! Source definition loading from TOML files.
//!
//! Definitions live under `source-definitions/`, optionally grouped into
//! category subdirectories. Each file is named after the source ID it defines.

use crate::{
    definition::SourceDefinition,
    error::{Result, SourceError},
};
use roster_core::SourceId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the definitions directory looked up from the workspace root.
const DEFINITIONS_DIR: &str = "source-definitions";

/// Loader for source definitions from TOML files.
pub struct SourceLoader {
    /// Base directory containing source definitions
    definitions_dir: PathBuf,
}

impl SourceLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the path doesn't exist or isn't a directory.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(SourceError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Walks up from the current directory to the workspace root (the first
    /// `Cargo.toml` declaring `[workspace]`) and uses its `source-definitions/`.
    pub fn with_default_dir() -> Result<Self> {
        let start = std::env::current_dir()?;

        for dir in start.ancestors() {
            let manifest = dir.join("Cargo.toml");
            let is_workspace = std::fs::read_to_string(&manifest)
                .map(|contents| contents.contains("[workspace]"))
                .unwrap_or(false);
            if is_workspace {
                return Self::new(dir.join(DEFINITIONS_DIR));
            }
        }

        Self::new(DEFINITIONS_DIR)
    }

    /// Directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Load a single source definition by ID.
    ///
    /// # Errors
    /// Returns error if the definition file doesn't exist, can't be read, or is invalid.
    pub fn load(&self, source_id: &SourceId) -> Result<SourceDefinition> {
        let filename = format!("{}.toml", source_id.as_str());
        let path = find_file(&self.definitions_dir, &filename)?.ok_or_else(|| {
            SourceError::NotFound {
                source_id: source_id.to_string(),
            }
        })?;

        let definition = load_from_path(&path)?;
        definition.validate()?;

        if definition.id() != source_id {
            return Err(SourceError::ValidationError {
                source_id: source_id.to_string(),
                reason: format!(
                    "{} declares id '{}' but is named after '{source_id}'",
                    path.display(),
                    definition.id()
                ),
            });
        }

        debug!(
            source_id = %source_id,
            name = %definition.name(),
            "loaded source definition"
        );

        Ok(definition)
    }

    /// Load all source definitions from the definitions directory.
    ///
    /// Invalid files and duplicate IDs are logged as warnings and skipped.
    /// The result is sorted by source ID.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<SourceDefinition>> {
        let mut paths = Vec::new();
        collect_toml_files(&self.definitions_dir, &mut paths)?;
        paths.sort();

        let mut seen = HashSet::new();
        let mut definitions = Vec::new();

        for path in paths {
            let definition = match load_from_path(&path).and_then(|d| d.validate().map(|()| d)) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping invalid source definition"
                    );
                    continue;
                }
            };

            if !seen.insert(definition.id().clone()) {
                warn!(
                    path = %path.display(),
                    source_id = %definition.id(),
                    "skipping duplicate source definition"
                );
                continue;
            }

            definitions.push(definition);
        }

        definitions.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded source definitions"
        );

        Ok(definitions)
    }
}

/// Parse a definition from TOML text without touching the filesystem.
pub fn parse_definition(contents: &str) -> Result<SourceDefinition> {
    let definition: SourceDefinition =
        toml::from_str(contents).map_err(|e| SourceError::ParseError {
            path: "<inline>".to_string(),
            source: e,
        })?;
    definition.validate()?;
    Ok(definition)
}

fn collect_toml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_toml_files(&path, out)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("toml")
            && path.file_name().and_then(|s| s.to_str()) != Some("README.toml")
        {
            out.push(path);
        }
    }
    Ok(())
}

fn find_file(dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            if let Some(found) = find_file(&path, filename)? {
                return Ok(Some(found));
            }
        } else if path.file_name().and_then(|s| s.to_str()) == Some(filename) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn load_from_path(path: &Path) -> Result<SourceDefinition> {
    let contents = std::fs::read_to_string(path).map_err(|e| SourceError::LoadError {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;

    toml::from_str(&contents).map_err(|e| SourceError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}
