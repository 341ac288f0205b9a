//! Session-scoped numeric IDs for elements shown to the user.
//!
//! IDs are handed out in pre-order during a rebuild and are only valid until
//! the next one. They are not stable across rebuilds: if the provider's tree
//! changes, `#7` may point somewhere else after the next `tree` or `ls`.

use crate::element::{ElementTree, NodeId};
use crate::errors::NavigationError;
use crate::executor::Deadline;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One registered element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: usize,
    pub node: NodeId,
    /// Depth below the root the registry was rebuilt from.
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct SessionIdRegistry {
    entries: Vec<RegistryEntry>,
    by_node: HashMap<NodeId, usize>,
    complete: bool,
}

impl SessionIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the registry and assigns `0, 1, 2, …` to every element reached
    /// by a pre-order walk from `root`, loading children along the way.
    ///
    /// The walk is bounded by the tree's walk timeout. On timeout the IDs
    /// assigned so far are kept, [`SessionIdRegistry::is_complete`] turns
    /// false and the error is returned.
    pub fn rebuild(
        &mut self,
        tree: &mut ElementTree,
        root: NodeId,
        max_depth: Option<usize>,
    ) -> Result<(), NavigationError> {
        self.clear();

        let deadline = Deadline::after(tree.config().walk_timeout);
        let entries = &mut self.entries;
        let by_node = &mut self.by_node;
        let walked = tree.walk(root, max_depth, &deadline, |_, node, depth| {
            if by_node.contains_key(&node) {
                return;
            }
            let id = entries.len();
            by_node.insert(node, id);
            entries.push(RegistryEntry { id, node, depth });
        });

        match walked {
            Ok(()) => {
                self.complete = true;
                debug!("Registry rebuilt with {} elements", self.entries.len());
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Registry rebuild stopped after {} elements: {e}",
                    self.entries.len()
                );
                Err(e)
            }
        }
    }

    pub fn lookup(&self, id: usize) -> Result<NodeId, NavigationError> {
        self.entries
            .get(id)
            .map(|entry| entry.node)
            .ok_or_else(|| {
                if self.entries.is_empty() {
                    NavigationError::NotFound(format!(
                        "#{id}: no IDs assigned yet, display the tree first"
                    ))
                } else {
                    NavigationError::NotFound(format!(
                        "#{id}: the last tree display assigned #0 to #{}",
                        self.entries.len() - 1
                    ))
                }
            })
    }

    /// Reverse lookup by element identity.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.by_node.get(&node).copied()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// False when the last rebuild was cut short.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_node.clear();
        self.complete = false;
    }
}
