//! Key-path addressable view of the merged configuration.

use serde_json::{Map, Value};

/// The full merged configuration as a JSON tree.
///
/// Paths are dot separated (`"repl.port"`). Modules receive their slice
/// through [`ConfigTree::module_config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// Wraps a JSON value. Non-object roots are replaced by an empty object.
    pub fn new(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self { root }
    }

    /// Returns the root value.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Returns the value at `path`, or `default` when the path is missing.
    pub fn get(&self, path: &str, default: Value) -> Value {
        self.lookup(path).cloned().unwrap_or(default)
    }

    /// Returns a reference to the value at `path`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.')
            .try_fold(&self.root, |current, segment| current.get(segment))
    }

    /// Whether a value exists at `path`.
    pub fn has(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Sets `value` at `path`, creating intermediate objects. Non-object
    /// intermediates are overwritten.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut current = &mut self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                return;
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return;
            }
            current = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }

    /// Returns the configuration slice for module `name`.
    ///
    /// Missing or non-object slices become `{}`. `moduleid` is set to `name`
    /// and `basepath` to `basepath` unless the slice already defines them.
    pub fn module_config(&self, name: &str, basepath: &str) -> Map<String, Value> {
        let mut slice = match self.lookup(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        slice
            .entry("moduleid")
            .or_insert_with(|| Value::String(name.to_string()));
        slice
            .entry("basepath")
            .or_insert_with(|| Value::String(basepath.to_string()));
        slice
    }
}
