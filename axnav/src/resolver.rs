//! Turning selectors into elements.
//!
//! Matching always takes the first hit in document order and never
//! backtracks. To reach the second of two identical siblings, use an index or
//! a `#id` instead of a path.

use crate::element::{role_matches, ChildrenState, Element, ElementTree, NodeId};
use crate::errors::{ErrorKind, NavigationError};
use crate::registry::SessionIdRegistry;
use crate::selector::{PathComponent, PathExpression};
use tracing::debug;

/// Whether `element` satisfies one path component: role always, plus the
/// title or `AXIdentifier` when the component names one.
pub fn component_matches(element: &Element, component: &PathComponent) -> bool {
    if !role_matches(&element.role, &component.role) {
        return false;
    }
    match component.identifier.as_deref() {
        None => true,
        Some(wanted) => {
            eq_ignore_case(&element.title, wanted)
                || element
                    .identifier
                    .as_deref()
                    .is_some_and(|identifier| eq_ignore_case(identifier, wanted))
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Walks `path` down from `root`. A first component that matches `root`
/// itself is consumed without descending.
pub fn resolve_by_path(
    tree: &mut ElementTree,
    path: &PathExpression,
    root: NodeId,
) -> Result<NodeId, NavigationError> {
    let mut remaining = path.components();
    if let Some(first) = remaining.first() {
        if component_matches(tree.element(root)?, first) {
            remaining = &remaining[1..];
        }
    }

    let resolved = resolve_path_below(tree, remaining, root)?;
    debug!("Resolved path {path} to node {}", resolved.index());
    Ok(resolved)
}

/// Matches `components` against the descendants of `root` only, one level
/// per component. An empty slice resolves to `root`.
pub fn resolve_path_below(
    tree: &mut ElementTree,
    components: &[PathComponent],
    root: NodeId,
) -> Result<NodeId, NavigationError> {
    let mut current = root;
    for component in components {
        let state = tree.load_children(current);
        match matching_children(tree, current, component).first() {
            Some(child) => current = *child,
            None => return Err(miss(tree, current, state, component)),
        }
    }
    Ok(current)
}

/// Like [`resolve_path_below`], but a component that matches more than one
/// sibling is an error instead of a first-match pick.
pub fn resolve_path_unique(
    tree: &mut ElementTree,
    components: &[PathComponent],
    root: NodeId,
) -> Result<NodeId, NavigationError> {
    let mut current = root;
    for component in components {
        let state = tree.load_children(current);
        match matching_children(tree, current, component).as_slice() {
            [child] => current = *child,
            [] => return Err(miss(tree, current, state, component)),
            several => {
                return Err(NavigationError::NotFound(format!(
                    "path component '{component}' matches {} elements under {}",
                    several.len(),
                    describe(tree, current)
                )))
            }
        }
    }
    Ok(current)
}

/// Follows recorded child positions below `root`. The node at every position
/// has to match the component at the same depth.
pub fn resolve_by_positions(
    tree: &mut ElementTree,
    components: &[PathComponent],
    positions: &[usize],
    root: NodeId,
) -> Result<NodeId, NavigationError> {
    if components.len() != positions.len() {
        return Err(NavigationError::InvalidSelector(format!(
            "{} path components but {} positions",
            components.len(),
            positions.len()
        )));
    }
    let mut current = root;
    for (component, &position) in components.iter().zip(positions) {
        let state = tree.load_children(current);
        let child = tree.children(current).get(position).copied().filter(|child| {
            tree.get(*child)
                .is_some_and(|element| component_matches(element, component))
        });
        match child {
            Some(child) => current = child,
            None if matches!(state, ChildrenState::Failed(_)) => {
                return Err(miss(tree, current, state, component))
            }
            None => {
                return Err(NavigationError::NotFound(format!(
                    "no '{component}' at position {position} under {} any more",
                    describe(tree, current)
                )))
            }
        }
    }
    Ok(current)
}

/// Index of every node below the root in its parent's children, from the
/// root down to `node`.
pub fn child_positions(tree: &ElementTree, node: NodeId) -> Vec<usize> {
    tree.lineage(node)
        .windows(2)
        .filter_map(|pair| {
            tree.children(pair[0])
                .iter()
                .position(|child| *child == pair[1])
        })
        .collect()
}

fn matching_children(tree: &ElementTree, parent: NodeId, component: &PathComponent) -> Vec<NodeId> {
    tree.children(parent)
        .iter()
        .copied()
        .filter(|child| {
            tree.get(*child)
                .is_some_and(|element| component_matches(element, component))
        })
        .collect()
}

fn miss(
    tree: &ElementTree,
    parent: NodeId,
    state: ChildrenState,
    component: &PathComponent,
) -> NavigationError {
    let parent = describe(tree, parent);
    match state {
        ChildrenState::Failed(ErrorKind::Timeout) => NavigationError::timeout(
            format!("load children of {parent} while resolving '{component}'"),
            tree.config().element_timeout,
        ),
        ChildrenState::Failed(_) => NavigationError::ProviderError(format!(
            "children of {parent} are not accessible, cannot resolve '{component}'"
        )),
        _ => NavigationError::NotFound(format!(
            "path component '{component}' matched nothing under {parent}"
        )),
    }
}

fn describe(tree: &ElementTree, node: NodeId) -> String {
    tree.get(node)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()))
}

/// Purely positional pick from a caller-defined candidate list.
pub fn resolve_by_index(index: usize, candidates: &[NodeId]) -> Result<NodeId, NavigationError> {
    candidates
        .get(index)
        .copied()
        .ok_or(NavigationError::IndexOutOfRange {
            index,
            len: candidates.len(),
        })
}

/// Looks `id` up in the registry built by the last tree display.
pub fn resolve_by_id(id: usize, registry: &SessionIdRegistry) -> Result<NodeId, NavigationError> {
    registry.lookup(id)
}

/// Path from the tree root to `node`, usable to find it again after a
/// rebuild.
pub fn path_to(tree: &ElementTree, node: NodeId) -> Result<PathExpression, NavigationError> {
    let components = tree
        .lineage(node)
        .into_iter()
        .filter_map(|id| tree.get(id))
        .map(|element| PathComponent::new(element.role.clone(), element.name().map(str::to_string)))
        .collect();
    PathExpression::new(components)
}
