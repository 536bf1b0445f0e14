//! In-memory source definition registry with query support.

use crate::{
    definition::{SourceCategory, SourceDefinition},
    error::{Result, SourceError},
    loader::SourceLoader,
};
use roster_core::SourceId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// In-memory cache of source definitions.
///
/// Cloning the registry shares the same underlying cache.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    definitions: Arc<RwLock<HashMap<SourceId, SourceDefinition>>>,
}

impl SourceRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry and load all definitions from the given loader.
    pub fn load_from(loader: &SourceLoader) -> Result<Self> {
        let registry = Self::new();
        registry.reload(loader)?;
        Ok(registry)
    }

    /// Replace the cache with freshly loaded definitions.
    pub fn reload(&self, loader: &SourceLoader) -> Result<()> {
        let definitions = loader.load_all()?;

        let mut cache = self.write();
        cache.clear();
        for definition in definitions {
            cache.insert(definition.id().clone(), definition);
        }

        info!(count = cache.len(), "reloaded source definitions");
        Ok(())
    }

    /// Get a source definition by ID.
    pub fn get(&self, source_id: &SourceId) -> Result<SourceDefinition> {
        self.read()
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                source_id: source_id.to_string(),
            })
    }

    /// All definitions, sorted by ID.
    #[must_use]
    pub fn get_all(&self) -> Vec<SourceDefinition> {
        let mut all: Vec<_> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        all
    }

    /// Definitions in one category, sorted by ID.
    #[must_use]
    pub fn get_by_category(&self, category: SourceCategory) -> Vec<SourceDefinition> {
        self.get_all()
            .into_iter()
            .filter(|def| def.category() == category)
            .collect()
    }

    /// Number of definitions in the registry.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Check if a source exists in the registry.
    #[must_use]
    pub fn contains(&self, source_id: &SourceId) -> bool {
        self.read().contains_key(source_id)
    }

    /// Definition count per category.
    #[must_use]
    pub fn count_by_category(&self) -> HashMap<SourceCategory, usize> {
        let mut counts = HashMap::new();
        for definition in self.read().values() {
            *counts.entry(definition.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Add or replace a definition after validating it.
    pub fn insert(&self, definition: SourceDefinition) -> Result<()> {
        definition.validate()?;

        let source_id = definition.id().clone();
        self.write().insert(source_id.clone(), definition);

        debug!(source_id = %source_id, "inserted source definition");
        Ok(())
    }

    /// Remove a definition; returns whether it was present.
    pub fn remove(&self, source_id: &SourceId) -> bool {
        let removed = self.write().remove(source_id).is_some();
        if removed {
            debug!(source_id = %source_id, "removed source definition");
        }
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SourceId, SourceDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SourceId, SourceDefinition>> {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
