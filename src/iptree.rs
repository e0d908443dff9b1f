use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::error::TreeError;
use crate::hooks::UserDataHooks;
use crate::node::Node;
use crate::prefix::Prefix;
use crate::tree::{FamilyTree, Hit};

/// Anything the dual-family tree accepts as a key: address strings, CIDR
/// strings (host bits must be zero), plain addresses, or networks.
pub trait IntoNetwork {
    fn into_network(self) -> Result<IpNet, TreeError>;
}

impl IntoNetwork for IpNet {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(self)
    }
}

impl IntoNetwork for Ipv4Net {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(IpNet::V4(self))
    }
}

impl IntoNetwork for Ipv6Net {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(IpNet::V6(self))
    }
}

impl IntoNetwork for IpAddr {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(IpNet::from(self))
    }
}

impl IntoNetwork for Ipv4Addr {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(IpNet::V4(Ipv4Net::from(self)))
    }
}

impl IntoNetwork for Ipv6Addr {
    fn into_network(self) -> Result<IpNet, TreeError> {
        Ok(IpNet::V6(Ipv6Net::from(self)))
    }
}

impl IntoNetwork for &str {
    fn into_network(self) -> Result<IpNet, TreeError> {
        if let Ok(addr) = self.parse::<IpAddr>() {
            return Ok(IpNet::from(addr));
        }
        let net: IpNet = self.parse().map_err(|err: ipnet::AddrParseError| {
            TreeError::Malformed {
                input: self.to_string(),
                reason: err.to_string(),
            }
        })?;
        if net.trunc() != net {
            return Err(TreeError::Malformed {
                input: self.to_string(),
                reason: "host bits set in CIDR".to_string(),
            });
        }
        Ok(net)
    }
}

impl IntoNetwork for String {
    fn into_network(self) -> Result<IpNet, TreeError> {
        self.as_str().into_network()
    }
}

/// Family-erased, read-only projection of a node for the dual façade.
#[derive(Clone, Copy, Debug)]
pub struct NodeView<'a, T> {
    network: IpNet,
    hit_count: u64,
    aggregated: bool,
    data: &'a T,
}

impl<'a, T> NodeView<'a, T> {
    fn of<P: Prefix>(node: &'a Node<P, T>) -> Self {
        Self {
            network: node.network().into(),
            hit_count: node.hit_count(),
            aggregated: node.aggregated(),
            data: node.data(),
        }
    }

    pub fn network(&self) -> IpNet {
        self.network
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn data(&self) -> &'a T {
        self.data
    }
}

impl<T> fmt::Display for NodeView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<IPNode: {}>", self.network)
    }
}

impl<P: Prefix> Hit<P> {
    fn widen(self) -> Hit<IpNet> {
        Hit {
            node: self.node.into(),
            leafs_removed: self.leafs_removed.into_iter().map(Into::into).collect(),
            leafs_added: self.leafs_added.into_iter().map(Into::into).collect(),
        }
    }
}

/// Both family trees behind one surface, dispatching on the key's family.
pub struct IpTree<T = ()> {
    v6: FamilyTree<Ipv6Net, T>,
    v4: FamilyTree<Ipv4Net, T>,
}

impl<T: Default> IpTree<T> {
    pub fn new() -> Self {
        Self {
            v6: FamilyTree::new(),
            v4: FamilyTree::new(),
        }
    }

    /// Build both trees with the same user-data hooks.
    pub fn with_hooks(hooks: UserDataHooks<T>) -> Self {
        Self {
            v6: FamilyTree::with_hooks(hooks.clone()),
            v4: FamilyTree::with_hooks(hooks),
        }
    }

    pub fn v4(&self) -> &FamilyTree<Ipv4Net, T> {
        &self.v4
    }

    pub fn v6(&self) -> &FamilyTree<Ipv6Net, T> {
        &self.v6
    }

    /// Count a hit against a single host address.
    pub fn add<K: IntoNetwork>(&mut self, key: K) -> Result<Hit<IpNet>, TreeError> {
        match key.into_network()? {
            IpNet::V4(net) => Ok(self.v4.add(net)?.widen()),
            IpNet::V6(net) => Ok(self.v6.add(net)?.widen()),
        }
    }

    pub fn get<K: IntoNetwork>(&self, key: K) -> Result<NodeView<'_, T>, TreeError> {
        match key.into_network()? {
            IpNet::V4(net) => Ok(NodeView::of(self.v4.find(&net)?)),
            IpNet::V6(net) => Ok(NodeView::of(self.v6.find(&net)?)),
        }
    }

    /// Mutable access to the payload of the node `key` resolves to.
    pub fn data_mut<K: IntoNetwork>(&mut self, key: K) -> Result<&mut T, TreeError> {
        match key.into_network()? {
            IpNet::V4(net) => Ok(self.v4.find_mut(&net)?.data_mut()),
            IpNet::V6(net) => Ok(self.v6.find_mut(&net)?.data_mut()),
        }
    }

    /// Remove the node matching `key` exactly.
    pub fn remove<K: IntoNetwork>(&mut self, key: K) -> Result<(), TreeError> {
        match key.into_network()? {
            IpNet::V4(net) => self.v4.remove(&net),
            IpNet::V6(net) => self.v6.remove(&net),
        }
    }

    /// All leaves, IPv6 family first.
    pub fn leafs(&self) -> impl Iterator<Item = NodeView<'_, T>> + '_ {
        self.v6
            .leafs()
            .map(|node| NodeView::of(node))
            .chain(self.v4.leafs().map(|node| NodeView::of(node)))
    }

    pub fn len(&self) -> usize {
        self.v6.len() + self.v4.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v6.is_empty() && self.v4.is_empty()
    }
}

impl<T: Default> Default for IpTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
