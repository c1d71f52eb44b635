//! Dependency ordering of module definitions.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use corekit_core::error::AppError;
use corekit_core::result::AppResult;
use corekit_core::types::sanitize_name;

use super::definition::ModuleDefinition;

/// Orders `definitions` so every module comes after the dependencies it
/// declares within the batch.
///
/// Repeatedly places the placeable definition with the lowest `priority`,
/// then the earliest input position. A dependency outside the batch is
/// external: it is either in `external` (already registered) or unknown,
/// and never blocks placement. Ids are compared by their sanitized form.
///
/// Fails with a cyclic dependency error naming one cycle when no
/// remaining definition can be placed.
pub fn sort_by_dependencies(
    definitions: Vec<ModuleDefinition>,
    external: &HashSet<String>,
) -> AppResult<Vec<ModuleDefinition>> {
    let in_batch: HashSet<String> = definitions
        .iter()
        .map(|definition| sanitize_name(&definition.id))
        .collect();

    for definition in &definitions {
        for dependency in &definition.dependencies {
            let key = sanitize_name(dependency);
            if !in_batch.contains(&key) && !external.contains(&key) {
                debug!(
                    module = %definition.id,
                    dependency = %dependency,
                    "Dependency outside the batch, treating as external"
                );
            }
        }
    }

    let mut remaining: Vec<(usize, ModuleDefinition)> = definitions.into_iter().enumerate().collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .enumerate()
            .filter(|(_, (_, definition))| {
                definition.dependencies.iter().all(|dependency| {
                    let key = sanitize_name(dependency);
                    placed.contains(&key) || !in_batch.contains(&key)
                })
            })
            .min_by_key(|(_, (index, definition))| (definition.priority, *index))
            .map(|(position, _)| position);

        let Some(position) = next else {
            let cycle = find_cycle(&remaining);
            return Err(AppError::cyclic_dependency(&cycle));
        };

        let (_, definition) = remaining.remove(position);
        placed.insert(sanitize_name(&definition.id));
        ordered.push(definition);
    }

    Ok(ordered)
}

/// Finds one dependency cycle among definitions that could not be placed.
fn find_cycle(remaining: &[(usize, ModuleDefinition)]) -> Vec<String> {
    let graph: HashMap<String, Vec<String>> = remaining
        .iter()
        .map(|(_, definition)| {
            (
                sanitize_name(&definition.id),
                definition
                    .dependencies
                    .iter()
                    .map(|dependency| sanitize_name(dependency))
                    .collect(),
            )
        })
        .collect();

    fn visit(
        node: &str,
        graph: &HashMap<String, Vec<String>>,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        if let Some(start) = stack.iter().position(|entry| entry == node) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if done.contains(node) {
            return None;
        }
        stack.push(node.to_string());
        for dependency in graph.get(node).into_iter().flatten() {
            if graph.contains_key(dependency) {
                if let Some(cycle) = visit(dependency, graph, stack, done) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        done.insert(node.to_string());
        None
    }

    let mut done = HashSet::new();
    for (_, definition) in remaining {
        let mut stack = Vec::new();
        if let Some(cycle) = visit(&sanitize_name(&definition.id), &graph, &mut stack, &mut done) {
            return cycle;
        }
    }

    // Unplaceable without a cycle cannot happen; name what is left.
    remaining
        .iter()
        .map(|(_, definition)| definition.id.clone())
        .collect()
}
