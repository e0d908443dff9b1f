use tracing::debug;

use crate::error::TreeError;
use crate::hooks::UserDataHooks;
use crate::limits::PrefixLimits;
use crate::node::Node;
use crate::prefix::Prefix;

pub type Ipv4Tree<T = ()> = FamilyTree<ipnet::Ipv4Net, T>;
pub type Ipv6Tree<T = ()> = FamilyTree<ipnet::Ipv6Net, T>;

/// Outcome of one `add`: the node the hit landed on plus the change in the
/// leaf population caused by the call. `leafs_added` holds at most one
/// entry (the new host leaf, or the aggregate that replaced it); nodes both
/// created and destroyed within the same call appear in neither list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit<P> {
    pub node: P,
    pub leafs_removed: Vec<P>,
    pub leafs_added: Vec<P>,
}

/// Where a descent towards a host address goes next.
enum Step<P> {
    /// An aggregate covering the address absorbs the hit in place.
    Absorb,
    /// The host leaf already exists.
    Found,
    /// Keep walking into this child.
    Into(usize),
    /// Free slot under the current node; attach a fresh host leaf.
    Leaf { bit: bool },
    /// The slot is taken by an unrelated subtree; split the edge with a
    /// fork node at the first distinguishing bit.
    Fork { fork: P, bit: bool, host_bit: bool },
}

/// Aggregating prefix tree for one address family.
///
/// Nodes live in an arena indexed by `usize`, the root at index 0 covering
/// the whole family. Parents own their children; `parent` backlinks are
/// plain indices. Detached subtrees go onto a free list and are reused.
#[derive(Clone)]
pub struct FamilyTree<P, T = ()> {
    pub(crate) nodes: Vec<Node<P, T>>,
    free: Vec<usize>,
    limits: PrefixLimits,
    hooks: UserDataHooks<T>,
}

impl<P, T> FamilyTree<P, T>
where
    P: Prefix,
    T: Default,
{
    pub fn new() -> Self {
        Self::assemble(P::default_limits(), UserDataHooks::default())
    }

    pub fn with_hooks(hooks: UserDataHooks<T>) -> Self {
        Self::assemble(P::default_limits(), hooks)
    }

    /// Build a tree with a custom checkpoint table. The table must end at
    /// the family width, where host leaves live.
    pub fn with_limits(limits: PrefixLimits, hooks: UserDataHooks<T>) -> Result<Self, TreeError> {
        if limits.max_depth() != P::MAX_LEN {
            return Err(TreeError::Misconfigured {
                reason: format!(
                    "table ends at /{} but the family width is {}",
                    limits.max_depth(),
                    P::MAX_LEN
                ),
            });
        }
        Ok(Self::assemble(limits, hooks))
    }

    fn assemble(limits: PrefixLimits, hooks: UserDataHooks<T>) -> Self {
        Self {
            nodes: vec![Node::branch(P::zero(), T::default())],
            free: Vec::new(),
            limits,
            hooks,
        }
    }

    pub fn prefix_limits(&self) -> &PrefixLimits {
        &self.limits
    }

    /// Number of hit-carrying leaves currently tracked.
    pub fn len(&self) -> usize {
        self.nodes[0].leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    fn child(&self, index: usize, bit: bool) -> Option<usize> {
        if bit {
            self.nodes[index].right
        } else {
            self.nodes[index].left
        }
    }

    #[inline(always)]
    fn set_child(&mut self, index: usize, child: usize, bit: bool) -> Option<usize> {
        self.nodes[child].parent = Some(index);
        if bit {
            self.nodes[index].right.replace(child)
        } else {
            self.nodes[index].left.replace(child)
        }
    }

    #[inline(always)]
    fn clear_child(&mut self, index: usize, bit: bool) -> Option<usize> {
        if bit {
            self.nodes[index].right.take()
        } else {
            self.nodes[index].left.take()
        }
    }

    #[inline(always)]
    fn new_node(&mut self, node: Node<P, T>) -> usize {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn fresh_data(&self) -> T {
        match &self.hooks.initial {
            Some(hook) => hook(),
            None => T::default(),
        }
    }

    /// Apply `delta` to the leaf counts of `index` and every ancestor.
    fn shift_leaf_count(&mut self, mut index: usize, delta: isize) {
        loop {
            let node = &mut self.nodes[index];
            node.leaf_count = (node.leaf_count as isize + delta) as usize;
            match node.parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
    }

    #[inline(always)]
    fn step(&self, index: usize, addr: &P) -> Step<P> {
        let node = &self.nodes[index];
        if node.aggregated {
            return Step::Absorb;
        }
        if node.prefix == *addr {
            return Step::Found;
        }
        let bit = addr.is_bit_set(node.prefix.prefix_len());
        match self.child(index, bit) {
            None => Step::Leaf { bit },
            Some(child) if self.nodes[child].prefix.contains(addr) => Step::Into(child),
            Some(child) => {
                let fork = addr.common_prefix(&self.nodes[child].prefix);
                let host_bit = addr.is_bit_set(fork.prefix_len());
                Step::Fork {
                    fork,
                    bit,
                    host_bit,
                }
            }
        }
    }

    /// Count a hit against a single host address.
    ///
    /// The hit lands on the covering aggregate if one exists, on the
    /// pre-existing host leaf otherwise, or on a freshly created leaf.
    /// Creation may push a checkpoint over its limit, in which case the
    /// subtree below that checkpoint collapses before the call returns
    /// (see `settle`).
    pub fn add(&mut self, addr: P) -> Result<Hit<P>, TreeError> {
        if addr.prefix_len() != P::MAX_LEN {
            return Err(TreeError::Malformed {
                input: addr.to_string(),
                reason: format!("add expects a /{} host address", P::MAX_LEN),
            });
        }
        let mut index = 0;
        let leaf = loop {
            match self.step(index, &addr) {
                Step::Absorb | Step::Found => {
                    self.nodes[index].hit_count += 1;
                    if let Some(hook) = self.hooks.add.clone() {
                        hook(self.nodes[index].data_mut());
                    }
                    return Ok(Hit {
                        node: self.nodes[index].prefix,
                        leafs_removed: Vec::new(),
                        leafs_added: Vec::new(),
                    });
                }
                Step::Into(next) => index = next,
                Step::Leaf { bit } => break self.attach_leaf(index, addr, bit),
                Step::Fork {
                    fork,
                    bit,
                    host_bit,
                } => break self.attach_fork(index, addr, fork, bit, host_bit),
            }
        };
        Ok(self.settle(leaf, addr))
    }

    fn attach_leaf(&mut self, parent: usize, addr: P, bit: bool) -> usize {
        let data = self.fresh_data();
        let leaf = self.new_node(Node::host(addr, data));
        self.set_child(parent, leaf, bit);
        self.shift_leaf_count(parent, 1);
        leaf
    }

    fn attach_fork(&mut self, parent: usize, addr: P, fork: P, bit: bool, host_bit: bool) -> usize {
        let branch = self.new_node(Node::branch(fork, T::default()));
        let sibling = self.set_child(parent, branch, bit).unwrap();
        self.set_child(branch, sibling, !host_bit);
        let data = self.fresh_data();
        let leaf = self.new_node(Node::host(addr, data));
        self.set_child(branch, leaf, host_bit);
        self.nodes[branch].leaf_count = self.nodes[sibling].leaf_count + 1;
        self.shift_leaf_count(parent, 1);
        leaf
    }

    /// Run the threshold scan after a leaf was created for `addr`.
    ///
    /// Checkpoints are scanned from deepest to shallowest; whenever the
    /// live leaf count under a checkpoint exceeds its limit, that subtree
    /// collapses into an aggregate and the scan continues upward with the
    /// updated counts. Since a collapse replaces at least two leaves with
    /// one, shallower checkpoints sink back under their limits, so each
    /// add collapses at most once: at the deepest exceeded checkpoint.
    /// Shallower checkpoints catch up on later adds by absorbing earlier
    /// aggregates along with fresh leaves.
    fn settle(&mut self, leaf: usize, addr: P) -> Hit<P> {
        let mut created: Vec<P> = vec![addr];
        let mut removed: Vec<P> = Vec::new();
        let mut landed = self.nodes[leaf].prefix;
        let checkpoints: Vec<(u8, usize)> = self.limits.checkpoints_desc().collect();
        for (depth, limit) in checkpoints {
            if limit == 0 || depth >= P::MAX_LEN {
                continue;
            }
            let Some(anchor) = self.anchor(&addr, depth) else {
                continue;
            };
            if self.nodes[anchor].leaf_count <= limit {
                continue;
            }
            let target = addr.supernet(depth);
            landed = self.aggregate(anchor, target, &mut created, &mut removed);
        }
        Hit {
            node: landed,
            leafs_removed: removed,
            leafs_added: created,
        }
    }

    /// Shallowest existing node with a prefix length of at least `depth` on
    /// the walk towards `addr`. Its subtree holds exactly the leaves inside
    /// the (possibly virtual) ancestor `addr.supernet(depth)`.
    fn anchor(&self, addr: &P, depth: u8) -> Option<usize> {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.prefix.prefix_len() >= depth {
                return Some(index);
            }
            let bit = addr.is_bit_set(node.prefix.prefix_len());
            match self.child(index, bit) {
                Some(child) if self.nodes[child].prefix.contains(addr) => index = child,
                _ => return None,
            }
        }
    }

    /// Collapse the subtree at `anchor` into a single aggregate leaf at
    /// `target`, preserving the summed hit count. Leaf payloads are drained
    /// into the `aggregate` hook; the collapsed nodes return to the free
    /// list. Bookkeeping for the enclosing `add` goes through `created` /
    /// `removed`: leaves born earlier in the same call vanish silently.
    fn aggregate(
        &mut self,
        anchor: usize,
        target: P,
        created: &mut Vec<P>,
        removed: &mut Vec<P>,
    ) -> P {
        let parent = self.nodes[anchor].parent.unwrap();
        let bit = self.nodes[parent].right == Some(anchor);
        let dropped = self.nodes[anchor].leaf_count;
        self.clear_child(parent, bit);

        let mut payloads = Vec::new();
        let mut hits = 0u64;
        let mut stack = vec![anchor];
        while let Some(index) = stack.pop() {
            let (left, right) = {
                let node = &mut self.nodes[index];
                node.parent = None;
                (node.left.take(), node.right.take())
            };
            match (left, right) {
                (None, None) => {
                    let node = &mut self.nodes[index];
                    hits += node.hit_count;
                    payloads.push(std::mem::take(&mut node.data));
                    let net = node.prefix;
                    if let Some(pos) = created.iter().position(|c| *c == net) {
                        created.remove(pos);
                    } else {
                        removed.push(net);
                    }
                }
                (left, right) => {
                    if let Some(right) = right {
                        stack.push(right);
                    }
                    if let Some(left) = left {
                        stack.push(left);
                    }
                }
            }
            self.free.push(index);
        }

        let mut data = self.fresh_data();
        if let Some(hook) = self.hooks.aggregate.clone() {
            hook(&mut data, payloads);
        }
        let agg = self.new_node(Node::aggregate(target, hits, data));
        self.set_child(parent, agg, bit);
        self.shift_leaf_count(parent, 1 - dropped as isize);
        created.push(target);
        debug!(network = %target, leafs = dropped, hits, "aggregated subtree");
        target
    }

    fn locate(&self, net: &P) -> Result<usize, TreeError> {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.prefix == *net {
                return Ok(index);
            }
            if index != 0 && node.is_leaf() {
                return Ok(index);
            }
            let bit = net.is_bit_set(node.prefix.prefix_len());
            match self.child(index, bit) {
                Some(child) if self.nodes[child].prefix.contains(net) => index = child,
                _ => {
                    return Err(TreeError::NotFound {
                        network: (*net).into(),
                    })
                }
            }
        }
    }

    /// Deepest node whose prefix covers `net`, provided it is a leaf (an
    /// aggregate counts) or an exact match. A host inside an aggregate
    /// resolves to the aggregate; a host under bare routing skeleton does
    /// not resolve at all.
    pub fn find(&self, net: &P) -> Result<&Node<P, T>, TreeError> {
        let index = self.locate(net)?;
        Ok(&self.nodes[index])
    }

    pub fn find_mut(&mut self, net: &P) -> Result<&mut Node<P, T>, TreeError> {
        let index = self.locate(net)?;
        Ok(&mut self.nodes[index])
    }

    /// Remove the node with exactly `net` (and everything below it), then
    /// prune any chain of now-childless routing ancestors. The root is not
    /// a removable entry. No user-data hooks run on removal.
    pub fn remove(&mut self, net: &P) -> Result<(), TreeError> {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.prefix == *net {
                break;
            }
            let bit = net.is_bit_set(node.prefix.prefix_len());
            match self.child(index, bit) {
                Some(child) if self.nodes[child].prefix.contains(net) => index = child,
                _ => {
                    return Err(TreeError::NotFound {
                        network: (*net).into(),
                    })
                }
            }
        }
        if index == 0 {
            return Err(TreeError::NotFound {
                network: (*net).into(),
            });
        }

        let parent = self.nodes[index].parent.unwrap();
        let bit = self.nodes[parent].right == Some(index);
        self.clear_child(parent, bit);
        let dropped = self.nodes[index].leaf_count;

        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            let node = &mut self.nodes[i];
            node.parent = None;
            if let Some(right) = node.right.take() {
                stack.push(right);
            }
            if let Some(left) = node.left.take() {
                stack.push(left);
            }
            self.free.push(i);
        }
        self.shift_leaf_count(parent, -(dropped as isize));

        let mut current = parent;
        while current != 0 && self.nodes[current].is_leaf() {
            let up = self.nodes[current].parent.unwrap();
            let bit = self.nodes[up].right == Some(current);
            self.clear_child(up, bit);
            self.nodes[current].parent = None;
            self.free.push(current);
            current = up;
        }
        debug!(network = %net, leafs = dropped, "removed subtree");
        Ok(())
    }
}

impl<P, T> Default for FamilyTree<P, T>
where
    P: Prefix,
    T: Default,
{
    fn default() -> Self {
        Self::new()
    }
}
