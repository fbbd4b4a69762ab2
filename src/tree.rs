//! Mutable network tree used to build databases.
//!
//! The tree is a binary trie over the 128 address bits. Nodes live in an
//! arena and refer to their children by index; node 0 is the root and is
//! never removed. A node may carry a network and have children at the same
//! time, since more specific networks can sit below a broader one.
//!
//! Deleting a network only detaches it and tombstones its node when nothing
//! hangs below it. Tombstoned nodes are skipped by every traversal and are
//! physically removed by [`NetworkTree::cleanup`].

use log::{debug, info};
use std::convert::Infallible;

use crate::network::Network;
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<usize>; 2],
    network: Option<Network>,
    deleted: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Builder-side trie of networks.
#[derive(Debug, Clone)]
pub struct NetworkTree {
    nodes: Vec<Node>,
}

impl Default for NetworkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTree {
    /// Create a tree holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Insert `network` at the node for its prefix.
    ///
    /// Inserting a network that is already present with identical
    /// attributes is a no-op; different attributes fail with
    /// [`Error::DuplicateNetwork`].
    pub fn insert(&mut self, network: Network) -> Result<()> {
        let address = network.first_address();
        let mut id = 0;

        for depth in 0..network.tree_depth() {
            let bit = address.bit(depth) as usize;
            id = match self.nodes[id].children[bit] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[id].children[bit] = Some(child);
                    child
                }
            };
            self.nodes[id].deleted = false;
        }

        let node = &mut self.nodes[id];
        match node.network {
            Some(existing) if !existing.same_attributes(&network) => {
                Err(Error::DuplicateNetwork(network.to_string()))
            }
            _ => {
                node.network = Some(network);
                Ok(())
            }
        }
    }

    /// Remove `network` from the tree. Returns `false` if it was not found.
    pub fn delete(&mut self, network: &Network) -> bool {
        match self.find_node(network) {
            Some(id) => self.detach(id).is_some(),
            None => false,
        }
    }

    /// Find the live node holding exactly `network`.
    fn find_node(&self, network: &Network) -> Option<usize> {
        let address = network.first_address();
        let mut id = 0;

        for depth in 0..network.tree_depth() {
            id = self.live_child(id, address.bit(depth))?;
        }

        match self.nodes[id].network {
            Some(existing) if existing == *network => Some(id),
            _ => None,
        }
    }

    /// Take the network off node `id`, tombstoning the node if nothing
    /// live remains below it.
    fn detach(&mut self, id: usize) -> Option<Network> {
        let network = self.nodes[id].network.take()?;
        if id != 0 && !self.has_live_children(id) {
            self.nodes[id].deleted = true;
        }
        Some(network)
    }

    fn has_live_children(&self, id: usize) -> bool {
        self.live_child(id, false).is_some() || self.live_child(id, true).is_some()
    }

    /// Child of `id` in direction `bit`, unless absent or tombstoned.
    pub(crate) fn live_child(&self, id: usize, bit: bool) -> Option<usize> {
        self.nodes[id].children[bit as usize].filter(|child| !self.nodes[*child].deleted)
    }

    pub(crate) fn network_at(&self, id: usize) -> Option<&Network> {
        self.nodes[id].network.as_ref()
    }

    /// Ids of all live nodes in pre-order (node, zero subtree, one subtree).
    pub(crate) fn live_preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];

        while let Some(id) = stack.pop() {
            if self.nodes[id].deleted {
                continue;
            }
            order.push(id);
            // One is pushed first so that zero is visited first.
            for bit in [1, 0] {
                if let Some(child) = self.nodes[id].children[bit] {
                    stack.push(child);
                }
            }
        }
        order
    }

    /// Visit every network in pre-order.
    ///
    /// Networks for which `filter` returns `false` are skipped without
    /// stopping the walk. The first error returned by `visit` aborts the walk
    /// and is passed back to the caller.
    pub fn walk<F, V, E>(&self, mut filter: F, mut visit: V) -> std::result::Result<(), E>
    where
        F: FnMut(&Network) -> bool,
        V: FnMut(&Network) -> std::result::Result<(), E>,
    {
        for id in self.live_preorder() {
            if let Some(network) = &self.nodes[id].network {
                if filter(network) {
                    visit(network)?;
                }
            }
        }
        Ok(())
    }

    /// All networks in pre-order.
    pub fn networks(&self) -> Vec<Network> {
        let mut networks = Vec::new();
        let _ = self.walk(
            |_| true,
            |network| {
                networks.push(*network);
                Ok::<(), Infallible>(())
            },
        );
        networks
    }

    /// Number of networks in the tree.
    pub fn count_networks(&self) -> usize {
        self.live_preorder()
            .into_iter()
            .filter(|id| self.nodes[*id].network.is_some())
            .count()
    }

    /// Number of live nodes, including the root.
    pub fn count_nodes(&self) -> usize {
        self.live_preorder().len()
    }

    /// Log every network at info level.
    pub fn dump(&self) {
        for network in self.networks() {
            info!("{}", network);
        }
    }

    /// Run dedup, merge and prune, in that order.
    ///
    /// Dedup runs a second time after merging, since a merged supernet can
    /// end up with the same attributes as its nearest enclosing network.
    pub fn cleanup(&mut self) -> Result<()> {
        let removed = self.dedup();
        debug!("Removed {} redundant networks", removed);

        let merged = self.merge();
        debug!("Merged {} pairs of adjacent networks", merged);

        if merged > 0 {
            let removed = self.dedup();
            debug!("Removed {} redundant networks after merging", removed);
        }

        let pruned = self.prune();
        debug!("Pruned {} empty nodes", pruned);

        Ok(())
    }

    /// Delete networks whose nearest supernet carries identical attributes.
    fn dedup(&mut self) -> usize {
        let mut ancestors: Vec<Network> = Vec::new();
        let mut removed = 0;

        for network in self.networks() {
            while let Some(top) = ancestors.last() {
                if network.is_subnet_of(top) {
                    break;
                }
                ancestors.pop();
            }

            let redundant = ancestors
                .last()
                .map_or(false, |parent| parent.same_attributes(&network));
            if !redundant {
                ancestors.push(network);
            } else if self.delete(&network) {
                removed += 1;
            }
        }
        removed
    }

    /// Replace sibling networks with identical attributes by their supernet.
    ///
    /// Nodes are processed children first, so a merged network can merge
    /// again with its own sibling further up.
    fn merge(&mut self) -> usize {
        let mut merged = 0;

        for id in self.live_preorder().into_iter().rev() {
            let (Some(zero), Some(one)) = (self.live_child(id, false), self.live_child(id, true))
            else {
                continue;
            };
            let (Some(a), Some(b)) = (self.nodes[zero].network, self.nodes[one].network) else {
                continue;
            };

            if !Self::mergeable(&a, &b) {
                continue;
            }
            let Some(supernet) = a.supernet() else {
                continue;
            };

            self.detach(zero);
            self.detach(one);
            self.nodes[id].network = Some(supernet.with_attributes_of(&a));
            merged += 1;
        }
        merged
    }

    fn mergeable(a: &Network, b: &Network) -> bool {
        a.family() == b.family()
            && a.prefix() == b.prefix()
            && a.same_attributes(b)
            && a.last_address().increment() == Some(b.first_address())
    }

    /// Drop tombstoned nodes and nodes with neither a network nor surviving
    /// children, then compact the arena. The root always stays.
    fn prune(&mut self) -> usize {
        let before = self.nodes.len();

        for id in self.live_preorder().into_iter().rev() {
            for bit in 0..2 {
                let Some(child) = self.nodes[id].children[bit] else {
                    continue;
                };
                let node = &self.nodes[child];
                if node.deleted || (node.network.is_none() && node.is_leaf()) {
                    self.nodes[id].children[bit] = None;
                }
            }
        }

        self.compact();
        before - self.nodes.len()
    }

    /// Rebuild the arena from the live nodes, renumbered in pre-order.
    fn compact(&mut self) {
        let order = self.live_preorder();
        let mut index = vec![usize::MAX; self.nodes.len()];
        for (new_id, old_id) in order.iter().enumerate() {
            index[*old_id] = new_id;
        }

        let nodes = order
            .iter()
            .map(|old_id| {
                let old = &self.nodes[*old_id];
                let mut children = [None, None];
                for (bit, slot) in children.iter_mut().enumerate() {
                    *slot = old.children[bit]
                        .filter(|child| !self.nodes[*child].deleted)
                        .map(|child| index[child]);
                }
                Node {
                    children,
                    network: old.network,
                    deleted: false,
                }
            })
            .collect();
        self.nodes = nodes;
    }
}
