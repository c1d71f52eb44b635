//! Compiled-in module factories, looked up by id when mounting.

use std::collections::HashMap;

use corekit_core::error::AppError;
use corekit_core::result::AppResult;

use super::definition::{Factory, ModuleDefinition};

/// Catalog of modules the binary knows how to build.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    /// Module id → template definition.
    entries: HashMap<String, ModuleDefinition>,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module with no declared dependencies.
    pub fn register(&mut self, id: impl Into<String>, factory: Factory) -> &mut Self {
        let id = id.into();
        self.entries
            .insert(id.clone(), ModuleDefinition::new(id, factory));
        self
    }

    /// Adds a full definition, replacing any entry with the same id.
    pub fn register_definition(&mut self, definition: ModuleDefinition) -> &mut Self {
        self.entries.insert(definition.id.clone(), definition);
        self
    }

    /// Returns the definition of `id`, or a load error.
    pub fn definition(&self, id: &str) -> AppResult<ModuleDefinition> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::load(format!("Cannot find module \"{id}\"")))
    }

    /// Returns the factory registered under `key`.
    pub fn factory(&self, key: &str) -> Option<Factory> {
        self.entries
            .get(key)
            .and_then(|definition| definition.factory.clone())
    }

    /// Whether `id` is known.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Known ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corekit_core::error::ErrorKind;
    use corekit_core::traits::Module;

    struct Noop;
    impl Module for Noop {}

    #[test]
    fn test_missing_module_is_load_error() {
        let catalog = ModuleCatalog::new();
        let err = catalog.definition("ghost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Load);
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn test_definition_keeps_dependencies() {
        let mut catalog = ModuleCatalog::new();
        catalog
            .register("logger", Factory::ready(Noop))
            .register_definition(
                ModuleDefinition::new("repl", Factory::ready(Noop)).with_dependencies(["dispatcher"]),
            );

        assert_eq!(catalog.ids(), vec!["logger", "repl"]);
        assert_eq!(catalog.definition("repl").unwrap().dependencies, vec!["dispatcher"]);
        assert!(catalog.factory("logger").is_some());
    }
}
