//! Hierarchy traversal over one generation of entity maps.
//!
//! Both traversals are pure functions over [`Lookups`], safe to call from
//! any number of threads at once. The parent graph is untrusted input: it
//! may contain cycles and dangling references, and both walks terminate on
//! either without erroring.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{EntityKind, Lookups};

/// One step on an ancestor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Entity name.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
}

/// A node of a descendant tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// Entity name.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Child entities, in kind order then name order.
    pub children: Vec<HierarchyNode>,
}

/// Walks parent references from an entity up to its root.
///
/// The returned path starts with the entity itself. The walk stops at a
/// root (no parent), at a name it has already visited (a cycle truncates
/// the path rather than failing), or at a parent that cannot be resolved.
/// A dangling parent is still appended before the walk stops; a parent
/// whose kind tag does not parse stops the walk without being appended.
///
/// Returns an empty path if the starting entity does not exist.
#[must_use]
pub fn ancestor_path(lookups: &Lookups, name: &str, kind: EntityKind) -> Vec<PathEntry> {
    let Some(start) = lookups.unit(kind, name) else {
        return Vec::new();
    };

    let mut path = vec![PathEntry {
        name: name.to_string(),
        kind,
    }];
    let mut visited: BTreeSet<&str> = BTreeSet::from([name]);
    let mut current = start;

    while let Some(parent) = &current.parent {
        if visited.contains(parent.name.as_str()) {
            break;
        }
        let Some(parent_kind) = EntityKind::parse(&parent.kind) else {
            break;
        };
        visited.insert(parent.name.as_str());
        path.push(PathEntry {
            name: parent.name.clone(),
            kind: parent_kind,
        });
        match lookups.unit(parent_kind, &parent.name) {
            Some(unit) => current = unit,
            // Dangling reference: the entry stays on the path, the walk ends.
            None => break,
        }
    }

    path
}

/// Builds the tree of all entities reaching `name` through their parent
/// references, transitively.
///
/// The entity's kind is resolved by probing the maps in
/// [`EntityKind::ALL`] order. A reverse adjacency map is built from every
/// entity's parent name once per call; this is linear in the total entity
/// count and acceptable at query time. A child whose name already appears
/// on its own root-to-node path is emitted as a childless leaf instead of
/// recursing.
///
/// Returns `None` if the named entity does not exist in any map.
#[must_use]
pub fn descendant_tree(lookups: &Lookups, name: &str) -> Option<HierarchyNode> {
    let kind = lookups.kind_of(name)?;

    // Reverse adjacency keyed by parent name. Iteration order of
    // `hierarchy_units` makes every child list deterministic.
    let mut children: BTreeMap<&str, Vec<(EntityKind, &str)>> = BTreeMap::new();
    for (child_kind, child_name, unit) in lookups.hierarchy_units() {
        if let Some(parent) = &unit.parent {
            children
                .entry(parent.name.as_str())
                .or_default()
                .push((child_kind, child_name));
        }
    }

    let mut on_path = BTreeSet::new();
    Some(build_node(name, kind, &children, &mut on_path))
}

fn build_node(
    name: &str,
    kind: EntityKind,
    children: &BTreeMap<&str, Vec<(EntityKind, &str)>>,
    on_path: &mut BTreeSet<String>,
) -> HierarchyNode {
    on_path.insert(name.to_string());

    let child_nodes = children
        .get(name)
        .map(|entries| {
            entries
                .iter()
                .map(|(child_kind, child_name)| {
                    if on_path.contains(*child_name) {
                        // Cycle guard: revisiting an ancestor ends the branch.
                        HierarchyNode {
                            name: (*child_name).to_string(),
                            kind: *child_kind,
                            children: Vec::new(),
                        }
                    } else {
                        build_node(child_name, *child_kind, children, on_path)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    on_path.remove(name);

    HierarchyNode {
        name: name.to_string(),
        kind,
        children: child_nodes,
    }
}
