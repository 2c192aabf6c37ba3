//! Directed disjoint-set forest over record ids.
//!
//! Unlike a textbook union-find, `union(child, master)` always hangs the
//! child's tree under the master's root, so the root of every set is the
//! record that survives as master. Path compression keeps `find` flat.

use rustc_hash::FxHashMap;
use sitemaster_core::RecordId;

#[derive(Debug, Default, Clone)]
pub struct DisjointSet {
    parent: FxHashMap<RecordId, RecordId>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of `id`'s set. Ids never seen are their own root.
    pub fn find(&mut self, id: RecordId) -> RecordId {
        let mut root = id;
        while let Some(&next) = self.parent.get(&root) {
            root = next;
        }

        // Path compression: point every node on the walk straight at the root
        let mut node = id;
        while let Some(&next) = self.parent.get(&node) {
            if next == root {
                break;
            }
            self.parent.insert(node, root);
            node = next;
        }

        root
    }

    /// Hang `child`'s set under `master`'s root.
    ///
    /// Returns `false` (and changes nothing) when both are already in the
    /// same set, i.e. the link would close a cycle.
    pub fn union(&mut self, child: RecordId, master: RecordId) -> bool {
        let child_root = self.find(child);
        let master_root = self.find(master);
        if child_root == master_root {
            return false;
        }
        self.parent.insert(child_root, master_root);
        true
    }
}
