//! Arena-indexed ordered trees
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Parent and
//! child links are indices, so subtrees can be moved around (the tree
//! completer does this a lot) without any pointer juggling. Nodes that are
//! detached stay in the arena until [`Tree::extract`] compacts a subtree into
//! a fresh tree.

use serde::{Deserialize, Serialize};

/// Index of a node inside its [`Tree`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An ordered tree (or forest, while being built) stored in an arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<T> {
    slots: Vec<Slot<T>>,
    root: NodeId,
}

impl<T> Tree<T> {
    /// Create a tree with a single root node.
    pub fn new(root: T) -> Self {
        Self {
            slots: vec![Slot {
                data: root,
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Make another node the root. The old root is left where it is.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn arena_len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.slots[id].data
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.slots[id].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id].children
    }

    pub fn num_children(&self, id: NodeId) -> usize {
        self.slots[id].children.len()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.slots[id].children.is_empty()
    }

    /// Allocate a node with no parent.
    pub fn new_node(&mut self, data: T) -> NodeId {
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.slots.len() - 1
    }

    /// Allocate a node and append it as last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: T) -> NodeId {
        let id = self.new_node(data);
        self.append_child(parent, id);
        id
    }

    /// Move `child` (with its subtree) to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.slots[child].parent = Some(parent);
        self.slots[parent].children.push(child);
    }

    /// Move `child` (with its subtree) to the front of `parent`'s children.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.slots[child].parent = Some(parent);
        self.slots[parent].children.insert(0, child);
    }

    /// Move `child` to position `index` among `parent`'s children (clamped
    /// to the end).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.slots[child].parent = Some(parent);
        let children = &mut self.slots[parent].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Position of `id` among its siblings.
    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.slots[id].parent?;
        self.slots[parent].children.iter().position(|&c| c == id)
    }

    /// Unlink `id` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.slots[id].parent.take() {
            self.slots[parent].children.retain(|&c| c != id);
        }
    }

    /// Node ids of the subtree under `id` in preorder (document order).
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            order.push(n);
            stack.extend(self.slots[n].children.iter().rev());
        }
        order
    }

    /// Leaves of the subtree under `id`, left to right.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder(id)
            .into_iter()
            .filter(|&n| self.is_leaf(n))
            .collect()
    }

    /// Nodes reachable from the root, in preorder.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
        self.preorder(self.root)
            .into_iter()
            .map(move |id| (id, &self.slots[id].data))
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.preorder(self.root).len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<T: Clone> Tree<T> {
    /// Copy the subtree rooted at `id` into a new, compact tree.
    ///
    /// Returns the new tree and a map from old ids to new ids (`None` for
    /// nodes outside the subtree).
    pub fn extract(&self, id: NodeId) -> (Tree<T>, Vec<Option<NodeId>>) {
        let mut remap = vec![None; self.slots.len()];
        let mut out = Tree::new(self.slots[id].data.clone());
        remap[id] = Some(out.root);
        for n in self.preorder(id).into_iter().skip(1) {
            let parent = self.slots[n]
                .parent
                .and_then(|p| remap[p])
                .unwrap_or(out.root);
            remap[n] = Some(out.add_child(parent, self.slots[n].data.clone()));
        }
        (out, remap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<&'static str> {
        let mut t = Tree::new("s");
        let a = t.add_child(0, "a");
        t.add_child(a, "a1");
        t.add_child(a, "a2");
        t.add_child(0, "b");
        t
    }

    #[test]
    fn test_preorder_and_leaves() {
        let t = sample();
        let labels: Vec<_> = t.iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec!["s", "a", "a1", "a2", "b"]);
        let leaves: Vec<_> = t.leaves(t.root()).into_iter().map(|n| *t.get(n)).collect();
        assert_eq!(leaves, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_move_subtree() {
        let mut t = sample();
        let b = 4;
        let a = 1;
        t.append_child(b, a);
        assert_eq!(t.children(0), &[b]);
        assert_eq!(t.parent(a), Some(b));
        let labels: Vec<_> = t.iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec!["s", "b", "a", "a1", "a2"]);
    }

    #[test]
    fn test_prepend_child_keeps_order() {
        let mut t = Tree::new(0);
        let x = t.add_child(0, 1);
        let y = t.new_node(2);
        t.prepend_child(0, y);
        assert_eq!(t.children(0), &[y, x]);
    }

    #[test]
    fn test_insert_child_at_position() {
        let mut t = sample();
        let c = t.new_node("c");
        t.insert_child(0, 1, c);
        assert_eq!(t.children(0), &[1, c, 4]);
        assert_eq!(t.sibling_index(c), Some(1));
        t.insert_child(1, 99, 4);
        assert_eq!(t.children(1), &[2, 3, 4]);
        assert_eq!(t.sibling_index(0), None);
    }

    #[test]
    fn test_extract_compacts_subtree() {
        let mut t = sample();
        t.detach(4);
        let (sub, remap) = t.extract(1);
        assert_eq!(sub.arena_len(), 3);
        assert_eq!(*sub.get(sub.root()), "a");
        assert_eq!(remap[4], None);
        assert_eq!(remap[2], Some(1));
        assert_eq!(t.len(), 4);
    }
}
