use crate::node::Node;
use crate::tree::FamilyTree;

/// Lazy walk over the current leaf population of one family tree:
/// depth-first, right subtree before left. Covers host leaves and
/// aggregates, plus the root while it is still childless. Each call to
/// `FamilyTree::leafs` starts a fresh traversal of the current state.
#[derive(Clone)]
pub struct Leafs<'a, P, T> {
    nodes: &'a [Node<P, T>],
    stack: Vec<usize>,
}

impl<'a, P, T> Iterator for Leafs<'a, P, T> {
    type Item = &'a Node<P, T>;

    fn next(&mut self) -> Option<&'a Node<P, T>> {
        while let Some(index) = self.stack.pop() {
            let node = &self.nodes[index];
            if let Some(left) = node.left {
                self.stack.push(left);
            }
            if let Some(right) = node.right {
                self.stack.push(right);
            }
            if node.is_leaf() {
                return Some(node);
            }
        }
        None
    }
}

impl<P, T> FamilyTree<P, T> {
    pub fn leafs(&self) -> Leafs<'_, P, T> {
        Leafs {
            nodes: self.nodes.as_slice(),
            stack: vec![0],
        }
    }
}
