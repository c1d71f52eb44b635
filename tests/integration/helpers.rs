//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use corekit_core::config::{AppConfig, ConfigTree};
use corekit_runtime::Application;
use corekit_runtime::commands::CommandCatalog;
use corekit_runtime::loader::ModuleCatalog;

/// Test application context
pub struct TestApp {
    /// The application under test
    pub app: Arc<Application>,
    /// Scratch directory holding `modules/` and `commands/`
    pub dir: TempDir,
}

impl TestApp {
    /// Application with the built-in catalogs.
    pub fn new(settings: Value) -> Self {
        Self::with_catalogs(settings, corekit::module_catalog(), corekit::command_catalog())
    }

    /// Application with the given catalogs. `settings` is merged over a
    /// base that never exits the process and mounts no core modules.
    pub fn with_catalogs(settings: Value, modules: ModuleCatalog, commands: CommandCatalog) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut root = json!({
            "app": { "name": "test-app", "exit_on_error": false },
            "loader": {
                "core_modules": [],
                "modules": dir.path().join("modules").to_string_lossy(),
                "commands": dir.path().join("commands").to_string_lossy(),
            },
        });
        merge(&mut root, settings);

        let tree = ConfigTree::new(root);
        let config = AppConfig::from_tree(&tree).expect("Failed to parse test config");
        let app = Application::new(config, tree, modules, commands);
        Self { app, dir }
    }

    /// Writes `contents` to `relative` under the scratch directory.
    pub fn write(&self, relative: &str, contents: &str) {
        write_file(self.dir.path(), relative, contents);
    }

    pub fn modules_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("modules")
    }

    pub fn commands_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("commands")
    }
}

/// Writes a file, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, contents).expect("Failed to write file");
}

/// Deep merges `overlay` into `base`.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
