//! In-flight dependency waits, used to catch modules waiting on each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use corekit_core::error::AppError;
use corekit_core::result::AppResult;

type Edges = HashMap<String, Vec<String>>;

/// Records which module is waiting on which.
///
/// An edge `child -> parent` means `parent` is waiting for `child`. Edges
/// live only as long as the [`FrameGuard`] returned by
/// [`DependencyGraph::enter`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Child id to the ids waiting on it.
    edges: Arc<Mutex<Edges>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Edges> {
        self.edges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records that `parent` waits for `child`.
    ///
    /// Fails with a cyclic dependency error when `child` is already waiting,
    /// directly or transitively, for `parent`.
    pub fn enter(&self, child: &str, parent: &str) -> AppResult<FrameGuard> {
        let mut edges = self.lock();

        if let Some(path) = ancestor_path(&edges, parent, child) {
            let mut chain: Vec<String> = path.into_iter().rev().collect();
            chain.push(child.to_string());
            return Err(AppError::cyclic_dependency(&chain));
        }

        edges
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());

        Ok(FrameGuard {
            edges: self.edges.clone(),
            child: child.to_string(),
            parent: parent.to_string(),
        })
    }

    /// Ids currently waiting for `child`.
    pub fn waiting_on(&self, child: &str) -> Vec<String> {
        self.lock().get(child).cloned().unwrap_or_default()
    }

    /// Whether no waits are recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Path `[start, waiter, waiter-of-waiter, ..., target]` when `target` is
/// `start` or transitively waits on it.
fn ancestor_path(edges: &Edges, start: &str, target: &str) -> Option<Vec<String>> {
    fn walk(
        edges: &Edges,
        current: &str,
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(current.to_string());
        if current == target {
            return true;
        }
        if visited.insert(current.to_string()) {
            if let Some(waiters) = edges.get(current) {
                for waiter in waiters {
                    if walk(edges, waiter, target, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    let mut visited = HashSet::new();
    let mut path = Vec::new();
    walk(edges, start, target, &mut visited, &mut path).then_some(path)
}

/// Removes its `child -> parent` edge when dropped.
#[derive(Debug)]
pub struct FrameGuard {
    edges: Arc<Mutex<Edges>>,
    child: String,
    parent: String,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let mut edges = self
            .edges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parents) = edges.get_mut(&self.child) {
            if let Some(position) = parents.iter().position(|p| *p == self.parent) {
                parents.remove(position);
            }
            if parents.is_empty() {
                edges.remove(&self.child);
            }
        }
    }
}
